//! Pixel-level image operations.
//!
//! The reduction only decides *which* frames are processed and in what
//! order; the arithmetic itself is delegated to an [`ImageEngine`].
//! [`NativeEngine`] is the built-in implementation working directly on FITS
//! files.

pub mod combine;
pub mod native;
pub mod region;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::consts::{SBIG_LINEARITY, SCHMIDT_LINEARITY};
use crate::error::Result;
use crate::io::listing::WorkingList;

pub use combine::{CombineMethod, CombineParams, Rejection};
pub use native::NativeEngine;
pub use region::TrimSection;

/// Image-processing operations the calibration stages rely on.
///
/// Every call is synchronous and either produces its output file or fails.
pub trait ImageEngine {
    fn name(&self) -> &str;

    /// One tab-delimited line per listed file with the requested header
    /// fields. `$I` stands for the file path; missing keywords read `INDEF`.
    fn header_fields(&self, list: &WorkingList, fields: &[&str]) -> Result<Vec<String>>;

    /// Combine all listed frames into `output`.
    fn combine(&self, list: &WorkingList, output: &Path, params: &CombineParams) -> Result<()>;

    /// `output = a <op> b`. At least one operand must be a frame.
    fn arithmetic(&self, a: &Operand, op: Operator, b: &Operand, output: &Path) -> Result<()>;

    /// Polynomial nonlinearity correction.
    fn linearize(&self, input: &Path, output: &Path, coeffs: &LinearityCoefficients) -> Result<()>;

    /// Copy the `region` of `input` into `output`.
    fn copy_region(&self, input: &Path, region: &TrimSection, output: &Path) -> Result<()>;

    fn statistic(&self, path: &Path, field: StatField) -> Result<f64>;

    /// Best-effort visualization. Callers never treat a failure as fatal.
    fn display(&self, path: &Path, frame_slot: u32) -> Result<()>;
}

#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Frame(PathBuf),
    Scalar(f64),
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Frame(path) => write!(f, "{}", path.display()),
            Self::Scalar(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operator {
    pub fn apply(&self, a: f32, b: f32) -> f32 {
        match self {
            Self::Add => a + b,
            Self::Subtract => a - b,
            Self::Multiply => a * b,
            // IRAF imarith replaces division by zero with 0.
            Self::Divide => {
                if b == 0.0 {
                    0.0
                } else {
                    a / b
                }
            }
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Add => write!(f, "+"),
            Self::Subtract => write!(f, "-"),
            Self::Multiply => write!(f, "*"),
            Self::Divide => write!(f, "/"),
        }
    }
}

/// Coefficients of `out = in * (c1 + c2*x + c3*x^2)`, `x = in / 32767`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearityCoefficients {
    pub c1: f64,
    pub c2: f64,
    pub c3: f64,
}

impl LinearityCoefficients {
    pub fn schmidt() -> Self {
        let [c1, c2, c3] = SCHMIDT_LINEARITY;
        Self { c1, c2, c3 }
    }

    pub fn sbig() -> Self {
        let [c1, c2, c3] = SBIG_LINEARITY;
        Self { c1, c2, c3 }
    }
}

impl Default for LinearityCoefficients {
    fn default() -> Self {
        Self::schmidt()
    }
}

impl std::fmt::Display for LinearityCoefficients {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}, {}]", self.c1, self.c2, self.c3)
    }
}

/// Per-frame statistic, named after the imstat fields.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatField {
    Npix,
    Mean,
    /// Central value; computed as the exact median.
    #[default]
    Midpt,
    Stddev,
    Min,
    Max,
}

impl std::fmt::Display for StatField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Npix => write!(f, "npix"),
            Self::Mean => write!(f, "mean"),
            Self::Midpt => write!(f, "midpt"),
            Self::Stddev => write!(f, "stddev"),
            Self::Min => write!(f, "min"),
            Self::Max => write!(f, "max"),
        }
    }
}
