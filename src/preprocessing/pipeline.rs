use crate::config::PreprocessConfig;
use crate::error::OcrError;
use image::{DynamicImage, ImageFormat};
use serde::Serialize;
use std::io::Cursor;
use std::time::Instant;

use super::steps;

/// Timing information for a single preprocessing step
#[derive(Debug, Clone, Serialize)]
pub struct StepTiming {
    pub name: String,
    pub time_ms: u64,
}

/// Result of preprocessing including timing stats
#[derive(Debug, Clone, Serialize)]
pub struct PreprocessingResult {
    /// Preprocessed single-channel image (not serialized)
    #[serde(skip)]
    pub image: DynamicImage,
    /// Total preprocessing time in milliseconds
    pub total_time_ms: u64,
    /// Individual step timings
    pub steps: Vec<StepTiming>,
}

/// Fixed-order pipeline: resize, grayscale, denoise, threshold
pub struct Pipeline {
    config: PreprocessConfig,
}

impl Pipeline {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Decode `raw`, run every step, and re-encode the result as PNG
    pub fn preprocess(&self, raw: &[u8]) -> Result<Vec<u8>, OcrError> {
        let decoded = decode_color(raw)?;
        let result = self.process(decoded)?;

        tracing::debug!(
            "Preprocessing finished in {}ms ({})",
            result.total_time_ms,
            result
                .steps
                .iter()
                .map(|s| format!("{}={}ms", s.name, s.time_ms))
                .collect::<Vec<_>>()
                .join(", ")
        );

        encode_png(&result.image)
    }

    /// Run the transform steps on an already decoded image
    pub fn process(&self, image: DynamicImage) -> Result<PreprocessingResult, OcrError> {
        let start = Instant::now();
        let mut steps_timing = Vec::new();
        let config = &self.config;

        let mut img = image;
        img = self.run_step("resize", img, &mut steps_timing, |img| {
            steps::resize::apply(img, config.max_dimension)
        })?;
        img = self.run_step("grayscale", img, &mut steps_timing, steps::grayscale::apply)?;
        img = self.run_step("denoise", img, &mut steps_timing, |img| {
            steps::denoise::apply(img, config)
        })?;
        img = self.run_step("threshold", img, &mut steps_timing, steps::threshold::apply)?;

        Ok(PreprocessingResult {
            image: img,
            total_time_ms: start.elapsed().as_millis() as u64,
            steps: steps_timing,
        })
    }

    fn run_step<F>(
        &self,
        name: &str,
        img: DynamicImage,
        timings: &mut Vec<StepTiming>,
        step_fn: F,
    ) -> Result<DynamicImage, OcrError>
    where
        F: FnOnce(DynamicImage) -> Result<DynamicImage, OcrError>,
    {
        let step_start = Instant::now();
        let result = step_fn(img)?;
        timings.push(StepTiming {
            name: name.to_string(),
            time_ms: step_start.elapsed().as_millis() as u64,
        });
        Ok(result)
    }
}

/// Decode any supported format into a 3-channel image
fn decode_color(raw: &[u8]) -> Result<DynamicImage, OcrError> {
    let decoded = image::load_from_memory(raw).map_err(OcrError::Decode)?;
    Ok(DynamicImage::ImageRgb8(decoded.into_rgb8()))
}

/// Lossless re-encode; a Luma8 image yields a single-channel PNG
fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, OcrError> {
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(OcrError::Encode)?;
    Ok(png)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use image::{ColorType, GenericImageView, Luma, Rgb, RgbImage};

    fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), format)
            .unwrap();
        bytes
    }

    /// Dark "text" bars on a bluish page
    fn document(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            if (y / 6) % 3 == 1 && (x / 4) % 4 != 3 {
                Rgb([30, 25, 40])
            } else {
                Rgb([225, 230, 245])
            }
        }))
    }

    fn small_config() -> PreprocessConfig {
        PreprocessConfig {
            max_dimension: 64,
            ..PreprocessConfig::default()
        }
    }

    #[test]
    fn test_preprocess_outputs_single_channel_png() {
        let raw = encode(document(48, 32), ImageFormat::Png);
        let out = Pipeline::new(PreprocessConfig::default())
            .preprocess(&raw)
            .unwrap();

        assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::Png);
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.color(), ColorType::L8);
        assert_eq!(decoded.dimensions(), (48, 32));
    }

    #[test]
    fn test_preprocess_output_is_binary() {
        let raw = encode(document(40, 40), ImageFormat::Jpeg);
        let out = Pipeline::new(PreprocessConfig::default())
            .preprocess(&raw)
            .unwrap();

        let decoded = image::load_from_memory(&out).unwrap().to_luma8();
        assert!(decoded.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
        // Text rows dark, page light
        assert_eq!(decoded.get_pixel(5, 9), &Luma([0]));
        assert_eq!(decoded.get_pixel(5, 2), &Luma([255]));
    }

    #[test]
    fn test_preprocess_downscales_to_max_dimension() {
        let raw = encode(document(200, 100), ImageFormat::Png);
        let out = Pipeline::new(small_config()).preprocess(&raw).unwrap();

        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.dimensions(), (64, 32));
    }

    #[test]
    fn test_preprocess_is_idempotent() {
        let raw = encode(document(200, 120), ImageFormat::Png);
        let pipeline = Pipeline::new(small_config());

        let once = pipeline.preprocess(&raw).unwrap();
        let twice = pipeline.preprocess(&once).unwrap();

        let once = image::load_from_memory(&once).unwrap().to_luma8();
        let twice = image::load_from_memory(&twice).unwrap().to_luma8();
        assert_eq!(once.dimensions(), twice.dimensions());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_preprocess_rejects_non_image_bytes() {
        let pipeline = Pipeline::new(PreprocessConfig::default());
        let png = encode(document(16, 16), ImageFormat::Png);

        for raw in [&b""[..], &b"definitely not an image"[..], &png[..20]] {
            let err = pipeline.preprocess(raw).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Decode, "got {:?}", err);
        }
    }

    #[test]
    fn test_process_records_every_step() {
        let result = Pipeline::new(PreprocessConfig::default())
            .process(document(20, 20))
            .unwrap();

        let names: Vec<&str> = result.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["resize", "grayscale", "denoise", "threshold"]);
        assert!(result.image.as_luma8().is_some());
    }
}
