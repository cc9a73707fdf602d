//! OCR engine implementations
//!
//! Concrete bindings behind the [`TextRecognizer`] trait.

pub mod tessdata;
pub mod tesseract;

use crate::config::Config;
use crate::engine::TextRecognizer;
use std::sync::Arc;
use tessdata::TessdataStore;

/// Build the recognizer described by the configuration
pub fn from_config(config: &Config) -> Arc<dyn TextRecognizer> {
    let dir = config
        .tessdata_path
        .clone()
        .unwrap_or_else(TessdataStore::default_dir);

    tracing::info!("Initializing tesseract engine...");
    Arc::new(tesseract::TesseractEngine::new(TessdataStore::new(
        dir,
        config.tessdata_download,
    )))
}
