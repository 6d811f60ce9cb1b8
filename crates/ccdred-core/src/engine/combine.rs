use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::consts::PARALLEL_PIXEL_THRESHOLD;
use crate::error::{ReductionError, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombineMethod {
    #[default]
    Median,
    Average,
}

impl std::fmt::Display for CombineMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Median => write!(f, "median"),
            Self::Average => write!(f, "average"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rejection {
    None,
    /// Drop the `nlow` lowest and `nhigh` highest samples of every pixel.
    #[default]
    MinMax,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::MinMax => write!(f, "minmax"),
        }
    }
}

/// Parameters of a frame combination.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombineParams {
    pub method: CombineMethod,
    pub reject: Rejection,
    /// Number of low samples rejected per pixel (minmax).
    pub nlow: usize,
    /// Number of high samples rejected per pixel (minmax).
    pub nhigh: usize,
}

impl Default for CombineParams {
    fn default() -> Self {
        Self {
            method: CombineMethod::Median,
            reject: Rejection::MinMax,
            nlow: 1,
            nhigh: 1,
        }
    }
}

impl CombineParams {
    /// Index range of the sorted samples that survive rejection. At least
    /// one sample is always kept.
    fn kept_range(&self, n: usize) -> (usize, usize) {
        match self.reject {
            Rejection::None => (0, n),
            Rejection::MinMax if self.nlow + self.nhigh < n => (self.nlow, n - self.nhigh),
            Rejection::MinMax => {
                let mid = (n - 1) / 2;
                (mid, mid + 1)
            }
        }
    }
}

/// Combine equally sized frames pixel by pixel.
///
/// Parallelizes at the row level for images >= 256x256.
pub fn combine_frames(frames: &[Array2<f32>], params: &CombineParams) -> Result<Array2<f32>> {
    if frames.is_empty() {
        return Err(ReductionError::EmptySequence);
    }

    let (h, w) = frames[0].dim();
    if let Some(other) = frames.iter().find(|f| f.dim() != (h, w)) {
        let (oh, ow) = other.dim();
        return Err(ReductionError::engine(
            "combine",
            format!("frame sizes differ: {w}x{h} vs {ow}x{oh}"),
        ));
    }
    let n = frames.len();

    let combine_row = |row: usize, pixel_values: &mut Vec<f32>, out: &mut [f32]| {
        for (col, result) in out.iter_mut().enumerate() {
            for (i, frame) in frames.iter().enumerate() {
                pixel_values[i] = frame[[row, col]];
            }
            *result = combine_pixel(pixel_values, params);
        }
    };

    let mut result = Array2::<f32>::zeros((h, w));
    if h * w >= PARALLEL_PIXEL_THRESHOLD && n > 1 {
        let rows: Vec<Vec<f32>> = (0..h)
            .into_par_iter()
            .map(|row| {
                let mut pixel_values = vec![0.0f32; n];
                let mut row_result = vec![0.0f32; w];
                combine_row(row, &mut pixel_values, &mut row_result);
                row_result
            })
            .collect();
        for (row, row_data) in rows.into_iter().enumerate() {
            for (col, val) in row_data.into_iter().enumerate() {
                result[[row, col]] = val;
            }
        }
    } else {
        let mut pixel_values = vec![0.0f32; n];
        let mut row_result = vec![0.0f32; w];
        for row in 0..h {
            combine_row(row, &mut pixel_values, &mut row_result);
            for (col, val) in row_result.iter().enumerate() {
                result[[row, col]] = *val;
            }
        }
    }
    Ok(result)
}

fn combine_pixel(pixel_values: &mut [f32], params: &CombineParams) -> f32 {
    pixel_values.sort_unstable_by(|a, b| a.total_cmp(b));
    let (lo, hi) = params.kept_range(pixel_values.len());
    let kept = &pixel_values[lo..hi];
    match params.method {
        CombineMethod::Average => kept.iter().sum::<f32>() / kept.len() as f32,
        CombineMethod::Median => sorted_median(kept),
    }
}

/// Median of an already sorted, non-empty slice.
pub(crate) fn sorted_median(sorted: &[f32]) -> f32 {
    let n = sorted.len();
    let mid = n / 2;
    if n % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}
