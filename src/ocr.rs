use crate::config::PreprocessConfig;
use crate::engine::{Language, TextRecognizer};
use crate::error::OcrError;
use crate::preprocessing::Pipeline;
use std::sync::Arc;

/// Preprocess-then-recognize pipeline shared by all requests.
///
/// Holds no per-request state; every call owns its image buffers and drops
/// them before returning.
pub struct OcrProcessor {
    engine: Arc<dyn TextRecognizer>,
    pipeline: Pipeline,
    preprocess_config: PreprocessConfig,
}

impl OcrProcessor {
    pub fn new(engine: Arc<dyn TextRecognizer>, preprocess_config: PreprocessConfig) -> Self {
        Self {
            engine,
            pipeline: Pipeline::new(preprocess_config),
            preprocess_config,
        }
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    pub fn available_languages(&self) -> Vec<String> {
        self.engine.available_languages()
    }

    pub fn preprocess_config(&self) -> &PreprocessConfig {
        &self.preprocess_config
    }

    /// Raw upload bytes to a binary single-channel PNG
    pub fn preprocess(&self, raw: &[u8]) -> Result<Vec<u8>, OcrError> {
        self.pipeline.preprocess(raw)
    }

    /// Decode `image_bytes`, run the engine, and tidy the text
    pub fn recognize(&self, image_bytes: &[u8], language: &Language) -> Result<String, OcrError> {
        let image = image::load_from_memory(image_bytes).map_err(OcrError::Decode)?;
        let raw = self.engine.extract_text(&image, language)?;
        Ok(clean_text(&raw))
    }

    /// Full pipeline for one upload
    pub fn process(&self, raw: &[u8], language: &Language) -> Result<String, OcrError> {
        let processed = self.preprocess(raw)?;
        self.recognize(&processed, language)
    }
}

/// Trim every line and drop the ones left empty, keeping line order
pub fn clean_text(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
