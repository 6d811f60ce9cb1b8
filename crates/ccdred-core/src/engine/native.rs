use std::path::{Path, PathBuf};

use ndarray::{s, Array2, Zip};
use tracing::debug;

use crate::consts::{INDEF, LINEARITY_NORM};
use crate::error::{ReductionError, Result};
use crate::io::fits::{read_fits, read_header, write_fits, FitsImage, HeaderValue};
use crate::io::fs as rfs;
use crate::io::listing::{read_list_file, WorkingList};
use crate::io::preview::save_preview;

use super::combine::{combine_frames, sorted_median, CombineParams};
use super::region::TrimSection;
use super::{ImageEngine, LinearityCoefficients, Operand, Operator, StatField};

/// Built-in engine operating on FITS files on disk.
#[derive(Clone, Debug, Default)]
pub struct NativeEngine {
    preview_dir: Option<PathBuf>,
}

impl NativeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render `display` calls as PNG previews into `dir`.
    pub fn with_previews(dir: impl Into<PathBuf>) -> Self {
        Self {
            preview_dir: Some(dir.into()),
        }
    }
}

impl ImageEngine for NativeEngine {
    fn name(&self) -> &str {
        "native"
    }

    fn header_fields(&self, list: &WorkingList, fields: &[&str]) -> Result<Vec<String>> {
        let mut rows = Vec::new();
        for path in read_list_file(list.path())? {
            let header = read_header(&path).map_err(|e| {
                ReductionError::metadata(path.display().to_string(), e.to_string())
            })?;
            let row: Vec<String> = fields
                .iter()
                .map(|field| {
                    if *field == "$I" {
                        path.to_string_lossy().into_owned()
                    } else {
                        header
                            .get(field)
                            .map(ToString::to_string)
                            .unwrap_or_else(|| INDEF.to_string())
                    }
                })
                .collect();
            rows.push(row.join("\t"));
        }
        Ok(rows)
    }

    fn combine(&self, list: &WorkingList, output: &Path, params: &CombineParams) -> Result<()> {
        let inputs = read_list_file(list.path())?;
        if inputs.is_empty() {
            return Err(ReductionError::EmptySequence);
        }
        let mut frames = Vec::with_capacity(inputs.len());
        let mut header = None;
        for path in &inputs {
            let image = read_fits(path)?;
            if header.is_none() {
                header = Some(image.header);
            }
            frames.push(image.data);
        }
        let data = combine_frames(&frames, params)?;

        let mut header = header.unwrap_or_default();
        header.set("NCOMBINE", HeaderValue::Int(inputs.len() as i64));
        header.add_history(format!(
            "combine {} reject={} nlow={} nhigh={}",
            params.method, params.reject, params.nlow, params.nhigh
        ));
        debug!(output = %output.display(), frames = inputs.len(), "combine");
        write_fits(output, &FitsImage::new(header, data))
    }

    fn arithmetic(&self, a: &Operand, op: Operator, b: &Operand, output: &Path) -> Result<()> {
        let mut image = match (a, b) {
            (Operand::Frame(pa), Operand::Frame(pb)) => {
                let mut left = read_fits(pa)?;
                let right = read_fits(pb)?;
                if left.data.dim() != right.data.dim() {
                    return Err(ReductionError::engine(
                        "arithmetic",
                        format!(
                            "{} and {} have different sizes",
                            pa.display(),
                            pb.display()
                        ),
                    ));
                }
                Zip::from(&mut left.data)
                    .and(&right.data)
                    .for_each(|l, &r| *l = op.apply(*l, r));
                left
            }
            (Operand::Frame(pa), Operand::Scalar(v)) => {
                let mut left = read_fits(pa)?;
                let v = *v as f32;
                left.data.mapv_inplace(|l| op.apply(l, v));
                left
            }
            (Operand::Scalar(v), Operand::Frame(pb)) => {
                let mut right = read_fits(pb)?;
                let v = *v as f32;
                right.data.mapv_inplace(|r| op.apply(v, r));
                right
            }
            (Operand::Scalar(_), Operand::Scalar(_)) => {
                return Err(ReductionError::engine(
                    "arithmetic",
                    "at least one operand must be a frame",
                ));
            }
        };
        image.header.add_history(format!("imarith {a} {op} {b}"));
        debug!(output = %output.display(), "{a} {op} {b}");
        write_fits(output, &image)
    }

    fn linearize(&self, input: &Path, output: &Path, coeffs: &LinearityCoefficients) -> Result<()> {
        let mut image = read_fits(input)?;
        let (c1, c2, c3) = (coeffs.c1 as f32, coeffs.c2 as f32, coeffs.c3 as f32);
        image.data.mapv_inplace(|v| {
            let x = v / LINEARITY_NORM;
            v * (c1 + c2 * x + c3 * x * x)
        });
        image.header.add_history(format!("irlincor coefficients {coeffs}"));
        write_fits(output, &image)
    }

    fn copy_region(&self, input: &Path, region: &TrimSection, output: &Path) -> Result<()> {
        let image = read_fits(input)?;
        let (rows, cols) = region.validated(image.width(), image.height())?;
        let data = image.data.slice(s![rows, cols]).to_owned();
        let mut header = image.header;
        header.add_history(format!("imcopy section {region}"));
        write_fits(output, &FitsImage::new(header, data))
    }

    fn statistic(&self, path: &Path, field: StatField) -> Result<f64> {
        let image = read_fits(path)?;
        compute_statistic(&image.data, field).ok_or_else(|| {
            ReductionError::engine(
                "statistic",
                format!("{} has no finite pixels", path.display()),
            )
        })
    }

    fn display(&self, path: &Path, frame_slot: u32) -> Result<()> {
        let Some(ref dir) = self.preview_dir else {
            debug!(path = %path.display(), frame_slot, "No preview directory, display skipped");
            return Ok(());
        };
        rfs::create_dir(dir)?;
        let image = read_fits(path)?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "frame".into());
        let png = dir.join(format!("{stem}.png"));
        save_preview(&image.data, &png)?;
        debug!(path = %png.display(), frame_slot, "Preview written");
        Ok(())
    }
}

/// Statistic over the finite pixels of `data`; `None` if there are none.
pub fn compute_statistic(data: &Array2<f32>, field: StatField) -> Option<f64> {
    let mut values: Vec<f32> = data.iter().copied().filter(|v| v.is_finite()).collect();
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let value = match field {
        StatField::Npix => n,
        StatField::Mean => mean(&values),
        StatField::Stddev => {
            let m = mean(&values);
            let var = values.iter().map(|&v| (v as f64 - m).powi(2)).sum::<f64>() / n;
            var.sqrt()
        }
        StatField::Min => values.iter().copied().fold(f32::INFINITY, f32::min) as f64,
        StatField::Max => values.iter().copied().fold(f32::NEG_INFINITY, f32::max) as f64,
        StatField::Midpt => {
            values.sort_unstable_by(|a, b| a.total_cmp(b));
            sorted_median(&values) as f64
        }
    };
    Some(value)
}

fn mean(values: &[f32]) -> f64 {
    values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64
}
