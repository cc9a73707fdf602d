//! Individual preprocessing steps, in pipeline order

pub mod resize;
pub mod grayscale;
pub mod denoise;
pub mod threshold;
