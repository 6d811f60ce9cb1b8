use std::path::Path;

use image::{GrayImage, ImageFormat, Luma};
use ndarray::Array2;

use crate::error::{ReductionError, Result};

/// Fraction of pixels clipped at each end when stretching a preview.
const PREVIEW_CLIP: f32 = 0.005;

/// Save raw pixel values as an 8-bit grayscale PNG, linearly stretched
/// between the low and high percentiles.
pub fn save_preview(data: &Array2<f32>, path: &Path) -> Result<()> {
    let (h, w) = data.dim();
    let mut sorted: Vec<f32> = data.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return Err(ReductionError::EmptySequence);
    }
    sorted.sort_by(f32::total_cmp);

    let n = sorted.len();
    let lo_idx = ((n as f32 * PREVIEW_CLIP) as usize).min(n - 1);
    let hi_idx = ((n as f32 * (1.0 - PREVIEW_CLIP)) as usize).min(n - 1);
    let black_point = sorted[lo_idx];
    let white_point = sorted[hi_idx];
    let range = (white_point - black_point).max(f32::EPSILON);

    let mut img = GrayImage::new(w as u32, h as u32);
    for row in 0..h {
        for col in 0..w {
            let v = ((data[[row, col]] - black_point) / range).clamp(0.0, 1.0);
            img.put_pixel(col as u32, row as u32, Luma([(v * 255.0) as u8]));
        }
    }

    img.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}
