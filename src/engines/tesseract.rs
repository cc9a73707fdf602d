//! Tesseract engine implementation
//!
//! Uses tesseract-static crate for static linking (no system dependencies).
//! Language data is resolved per request through the [`TessdataStore`].

use super::tessdata::TessdataStore;
use crate::engine::{Language, TextRecognizer};
use crate::error::OcrError;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tesseract_static::tesseract::{OcrEngineMode, Tesseract};

/// Page segmentation mode 6: assume a single uniform block of text
const PSM_SINGLE_BLOCK: &str = "6";

/// Tesseract OCR Engine
///
/// Every call builds a fresh Tesseract instance, so nothing is shared
/// between concurrent requests.
pub struct TesseractEngine {
    tessdata: TessdataStore,
}

impl TesseractEngine {
    pub fn new(tessdata: TessdataStore) -> Self {
        tracing::info!(
            "Tesseract engine ready (tessdata: {:?}, installed: [{}])",
            tessdata.dir(),
            tessdata.available().join(", ")
        );
        Self { tessdata }
    }
}

impl TextRecognizer for TesseractEngine {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn extract_text(&self, image: &DynamicImage, language: &Language) -> Result<String, OcrError> {
        self.tessdata.ensure(language)?;
        let datapath = self.tessdata.dir_str()?;

        let bmp_data = to_bmp(image)?;
        let (width, height) = (image.width(), image.height());

        tracing::debug!(
            "Recognizing {}x{} image, language: {}, BMP size: {} bytes",
            width,
            height,
            language,
            bmp_data.len()
        );

        let mut tess = Tesseract::new_with_oem(
            Some(datapath),
            Some(language.as_str()),
            OcrEngineMode::Default,
        )
            .map_err(|e| OcrError::engine("initialize", e.to_string()))?
            .set_variable("tessedit_pageseg_mode", PSM_SINGLE_BLOCK)
            .map_err(|e| OcrError::engine("set page segmentation mode", e.to_string()))?
            .set_image_from_mem(&bmp_data)
            .map_err(|e| OcrError::engine("load image", e.to_string()))?
            .recognize()
            .map_err(|e| OcrError::engine("recognize text", e.to_string()))?;

        tess.get_text()
            .map_err(|e| OcrError::engine("read text", e.to_string()))
    }

    fn available_languages(&self) -> Vec<String> {
        self.tessdata.available()
    }
}

/// Convert to BMP in memory (BMP is always supported by leptonica)
fn to_bmp(image: &DynamicImage) -> Result<Vec<u8>, OcrError> {
    let mut bmp_data = Vec::new();
    image
        .to_rgb8()
        .write_to(&mut Cursor::new(&mut bmp_data), ImageFormat::Bmp)
        .map_err(|e| OcrError::engine("encode image", e))?;
    Ok(bmp_data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;

    #[test]
    fn test_unknown_language_is_rejected_before_recognition() {
        let dir = tempfile::tempdir().unwrap();
        let engine = TesseractEngine::new(TessdataStore::new(dir.path().to_path_buf(), false));
        let image = DynamicImage::ImageLuma8(GrayImage::new(8, 8));

        let err = engine
            .extract_text(&image, &Language::parse("zzz").unwrap())
            .unwrap_err();
        assert!(matches!(err, OcrError::UnsupportedLanguage(_)));
    }

    #[test]
    fn test_bmp_conversion_keeps_dimensions() {
        let image = DynamicImage::ImageLuma8(GrayImage::new(9, 4));
        let bmp = to_bmp(&image).unwrap();

        assert_eq!(image::guess_format(&bmp).unwrap(), ImageFormat::Bmp);
        let decoded = image::load_from_memory(&bmp).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (9, 4));
    }

    #[test]
    fn test_bmp_conversion_failure_is_an_engine_error() {
        // Wider than a BMP header can describe
        let image = DynamicImage::ImageLuma8(GrayImage::new(u32::MAX / 2 + 1, 0));

        let err = to_bmp(&image).unwrap_err();
        assert!(matches!(err, OcrError::Engine { action: "encode image", .. }));
        assert_eq!(err.kind(), crate::error::ErrorKind::Engine);
    }
}
