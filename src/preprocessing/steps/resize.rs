use crate::error::OcrError;
use image::{imageops::FilterType, DynamicImage, GenericImageView};

/// Scale the image down so its larger side equals `max_dimension`.
/// Images already within bounds are returned untouched.
pub fn apply(image: DynamicImage, max_dimension: u32) -> Result<DynamicImage, OcrError> {
    let (width, height) = image.dimensions();

    match target_dimensions(width, height, max_dimension) {
        Some((new_width, new_height)) => {
            tracing::debug!(
                "Downscaling {}x{} to {}x{}",
                width,
                height,
                new_width,
                new_height
            );
            // Bilinear, like the usual document-scanner default
            Ok(image.resize_exact(new_width, new_height, FilterType::Triangle))
        }
        None => Ok(image),
    }
}

fn target_dimensions(width: u32, height: u32, max_dimension: u32) -> Option<(u32, u32)> {
    let larger = width.max(height);
    if larger <= max_dimension {
        return None;
    }

    let scale = max_dimension as f64 / larger as f64;
    let scaled = |side: u32| ((side as f64 * scale).round() as u32).clamp(1, max_dimension);

    if width >= height {
        Some((max_dimension, scaled(height)))
    } else {
        Some((scaled(width), max_dimension))
    }
}
