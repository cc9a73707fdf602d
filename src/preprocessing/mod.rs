//! Image preprocessing ahead of text recognition
//!
//! Turns arbitrary uploaded images into bounded-size, denoised, binary PNGs.

pub mod pipeline;
pub mod steps;

pub use pipeline::Pipeline;
