use crate::config::PreprocessConfig;
use crate::error::OcrError;
use image::{DynamicImage, GrayImage};
use rayon::prelude::*;

/// Weights below this fraction of the fixed-point scale are dropped
const WEIGHT_THRESHOLD: f64 = 0.001;
/// Output rows handled by one worker
const BAND_ROWS: usize = 32;
const SAMPLE_MAX: u64 = 255;

/// Apply non-local-means denoising with OpenCV's `fastNlMeansDenoising`
/// semantics for 8-bit grayscale.
///
/// Every pixel becomes a weighted mean of the pixels in its search window,
/// weighted by how similar their surrounding patches are. Character strokes
/// repeat across a page, so edges survive while sensor noise averages out.
/// Weights are fixed-point integers and borders are reflected without
/// repeating the edge pixel (reflect-101), so results are bit-identical to
/// OpenCV for the same parameters.
pub fn apply(image: DynamicImage, config: &PreprocessConfig) -> Result<DynamicImage, OcrError> {
    let gray = image.into_luma8();

    if config.denoise_strength <= 0.0 {
        return Ok(DynamicImage::ImageLuma8(gray));
    }

    let filter = NlmFilter::new(
        config.denoise_strength,
        config.template_window,
        config.search_window,
    );
    Ok(DynamicImage::ImageLuma8(filter.run(&gray)))
}

struct NlmFilter {
    template_radius: usize,
    search_radius: usize,
    /// log2 of the power of two nearest above the patch area
    avg_shift: u32,
    /// Fixed-point weight indexed by `ssd >> avg_shift`
    weights: Vec<u64>,
}

impl NlmFilter {
    fn new(strength: f32, template_window: u32, search_window: u32) -> Self {
        let template_radius = (template_window / 2) as usize;
        let search_radius = (search_window / 2) as usize;
        let template_side = (2 * template_radius + 1) as u64;
        let search_side = (2 * search_radius + 1) as u64;

        // Largest scale for which sum(weight * pixel) over a window fits in i32
        let fixed_point_mult = i32::MAX as u64 / (search_side * search_side * SAMPLE_MAX);

        let area = template_side * template_side;
        let avg_shift = area.next_power_of_two().trailing_zeros();
        let shift_to_mean = (1u64 << avg_shift) as f64 / area as f64;

        let max_dist = (SAMPLE_MAX * SAMPLE_MAX) as f64;
        let len = (max_dist / shift_to_mean + 1.0) as usize;
        let h2 = (strength * strength) as f64;

        let weights = (0..len)
            .map(|almost_dist| {
                let dist = almost_dist as f64 * shift_to_mean;
                let weight = (fixed_point_mult as f64 * (-dist / h2).exp()).round_ties_even();
                if weight < WEIGHT_THRESHOLD * fixed_point_mult as f64 {
                    0
                } else {
                    weight as u64
                }
            })
            .collect();

        Self {
            template_radius,
            search_radius,
            avg_shift,
            weights,
        }
    }

    fn weight(&self, ssd: u64) -> u64 {
        self.weights
            .get((ssd >> self.avg_shift) as usize)
            .copied()
            .unwrap_or(0)
    }

    fn run(&self, src: &GrayImage) -> GrayImage {
        let (width, height) = src.dimensions();
        if width == 0 || height == 0 {
            return src.clone();
        }

        let w = width as usize;
        let padded = Padded::reflect_101(src, self.template_radius + self.search_radius);

        let mut out = vec![0u8; w * height as usize];
        out.par_chunks_mut(BAND_ROWS * w)
            .enumerate()
            .for_each(|(band, rows)| {
                self.run_band(&padded, src, band * BAND_ROWS, rows);
            });

        // Buffer length always matches the source dimensions
        GrayImage::from_raw(width, height, out).unwrap_or_else(|| src.clone())
    }

    /// Denoise the output rows starting at `y0` into `rows`.
    ///
    /// Patch distances come from one integral image of squared differences
    /// per search offset, so the cost per pixel does not depend on the patch
    /// size.
    fn run_band(&self, padded: &Padded, src: &GrayImage, y0: usize, rows: &mut [u8]) {
        let w = src.width() as usize;
        let band_h = rows.len() / w;
        let t = self.template_radius;
        let s = self.search_radius;
        let side = 2 * t + 1;
        let pw = padded.width;
        let px = &padded.data;

        // Region pixel (rx, ry) is image pixel (rx - t, y0 + ry - t)
        let rw = w + 2 * t;
        let rh = band_h + 2 * t;
        let stride = rw + 1;

        let mut estimates = vec![0u64; band_h * w];
        let mut totals = vec![0u64; band_h * w];
        let mut integral = vec![0u64; stride * (rh + 1)];

        for dy in 0..=2 * s {
            for dx in 0..=2 * s {
                // Region pixel lives at padded (rx + s, y0 + ry + s); its
                // neighbour for this offset at padded (rx + dx, y0 + ry + dy).
                for ry in 0..rh {
                    let base = (y0 + ry + s) * pw + s;
                    let shifted = (y0 + ry + dy) * pw + dx;
                    let mut row_sum = 0u64;
                    for rx in 0..rw {
                        let diff = px[base + rx] as i32 - px[shifted + rx] as i32;
                        row_sum += (diff * diff) as u64;
                        integral[(ry + 1) * stride + rx + 1] = integral[ry * stride + rx + 1] + row_sum;
                    }
                }

                for y in 0..band_h {
                    for x in 0..w {
                        let (x1, y1) = (x + side, y + side);
                        let ssd = (integral[y1 * stride + x1] + integral[y * stride + x])
                            - (integral[y * stride + x1] + integral[y1 * stride + x]);

                        let weight = self.weight(ssd);
                        if weight == 0 {
                            continue;
                        }

                        let neighbour = px[(y0 + y + t + dy) * pw + x + t + dx] as u64;
                        estimates[y * w + x] += weight * neighbour;
                        totals[y * w + x] += weight;
                    }
                }
            }
        }

        for (i, value) in rows.iter_mut().enumerate() {
            // The zero offset always has the full weight unless the scale underflowed
            *value = match totals[i] {
                0 => src.as_raw()[y0 * w + i],
                total => ((estimates[i] + total / 2) / total).min(SAMPLE_MAX) as u8,
            };
        }
    }
}

/// Source image with a border of mirrored pixels on every side
struct Padded {
    width: usize,
    data: Vec<u8>,
}

impl Padded {
    fn reflect_101(src: &GrayImage, border: usize) -> Self {
        let (w, h) = (src.width() as usize, src.height() as usize);
        let width = w + 2 * border;
        let raw = src.as_raw();

        let columns: Vec<usize> = (0..width)
            .map(|px| reflect_101(px as isize - border as isize, w))
            .collect();

        let mut data = Vec::with_capacity(width * (h + 2 * border));
        for py in 0..h + 2 * border {
            let row = reflect_101(py as isize - border as isize, h) * w;
            data.extend(columns.iter().map(|&x| raw[row + x]));
        }

        Self { width, data }
    }
}

/// Mirror `p` into `0..len` without repeating the edge (`gfedcb|abcdefgh|gfedcba`)
fn reflect_101(p: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let last = len as isize - 1;
    let mut p = p;
    while p < 0 || p > last {
        p = if p < 0 { -p } else { 2 * last - p };
    }
    p as usize
}
