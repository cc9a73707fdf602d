use crate::error::OcrError;
use image::DynamicImage;
use imageproc::contrast::{otsu_level, threshold, ThresholdType};

/// Binarize with a global threshold chosen by Otsu's method.
/// Pixels brighter than the level become white, everything else black.
pub fn apply(image: DynamicImage) -> Result<DynamicImage, OcrError> {
    let gray = image.into_luma8();
    let level = otsu_level(&gray);
    tracing::debug!("Otsu threshold level: {}", level);

    let binarized = threshold(&gray, level, ThresholdType::Binary);
    Ok(DynamicImage::ImageLuma8(binarized))
}
