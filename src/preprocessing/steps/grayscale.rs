use crate::error::OcrError;
use image::{DynamicImage, GrayImage, Luma};

// ITU-R BT.601 luma weights in 14-bit fixed point; they sum to 1 << 14
const R_WEIGHT: u32 = 4899;
const G_WEIGHT: u32 = 9617;
const B_WEIGHT: u32 = 1868;
const SHIFT: u32 = 14;

/// Convert image to single-channel grayscale
pub fn apply(image: DynamicImage) -> Result<DynamicImage, OcrError> {
    if let DynamicImage::ImageLuma8(gray) = image {
        return Ok(DynamicImage::ImageLuma8(gray));
    }

    let rgb = image.into_rgb8();
    let gray = GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let luma = (r as u32 * R_WEIGHT + g as u32 * G_WEIGHT + b as u32 * B_WEIGHT
            + (1 << (SHIFT - 1)))
            >> SHIFT;
        Luma([luma as u8])
    });

    Ok(DynamicImage::ImageLuma8(gray))
}
