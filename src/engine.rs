use crate::error::OcrError;
use image::DynamicImage;
use std::fmt;

/// Tesseract language code, e.g. "eng", "amh", or a combination like "eng+amh"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Language(String);

impl Language {
    /// Validate a caller-supplied code.
    ///
    /// Codes end up in file names and download URLs, so only ASCII
    /// alphanumerics and `_` are accepted for each `+`-separated part.
    pub fn parse(code: &str) -> Result<Self, OcrError> {
        let code = code.trim();
        let valid = !code.is_empty()
            && code.split('+').all(|part| {
                !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            });

        if valid {
            Ok(Self(code.to_string()))
        } else {
            Err(OcrError::UnsupportedLanguage(code.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Individual language models making up this code
    pub fn parts(&self) -> impl Iterator<Item = &str> {
        self.0.split('+')
    }
}

impl Default for Language {
    fn default() -> Self {
        Self("eng".to_string())
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Capability the recognizer needs from an OCR engine: image + language in, raw text out
pub trait TextRecognizer: Send + Sync {
    /// Returns the engine identifier (e.g., "tesseract")
    fn name(&self) -> &'static str;

    /// Extract text from a decoded image, without any cleanup
    fn extract_text(&self, image: &DynamicImage, language: &Language) -> Result<String, OcrError>;

    /// Languages whose model data is currently available without downloading
    fn available_languages(&self) -> Vec<String>;
}
