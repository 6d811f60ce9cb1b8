use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::calibrate::CalibrationSettings;
use crate::engine::{CombineParams, LinearityCoefficients, StatField, TrimSection};
use crate::error::{ReductionError, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReductionConfig {
    /// Directory holding the raw frames of one night. Everything the
    /// reduction produces lands below it.
    pub working_dir: PathBuf,
    #[serde(default)]
    pub trim: TrimSection,
    #[serde(default)]
    pub normalization: StatField,
    /// Answer the confirmation point without asking.
    #[serde(default)]
    pub proceed: bool,
    #[serde(default = "default_display")]
    pub display: bool,
    /// Verbose tracing and retention of working lists.
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub linearity: LinearityCoefficients,
    #[serde(default)]
    pub combine: CombineParams,
}

fn default_display() -> bool {
    true
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("."),
            trim: TrimSection::default(),
            normalization: StatField::default(),
            proceed: false,
            display: default_display(),
            debug: false,
            linearity: LinearityCoefficients::default(),
            combine: CombineParams::default(),
        }
    }
}

impl ReductionConfig {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            ..Self::default()
        }
    }

    pub fn calibration_settings(&self) -> CalibrationSettings {
        CalibrationSettings {
            trim: self.trim,
            linearity: self.linearity,
            combine: self.combine.clone(),
            normalization: self.normalization,
        }
    }

    /// Reject settings no run could succeed with.
    pub fn validate(&self) -> Result<()> {
        if !self.working_dir.is_dir() {
            return Err(ReductionError::InvalidConfig(format!(
                "working directory {} does not exist",
                self.working_dir.display()
            )));
        }
        let LinearityCoefficients { c1, c2, c3 } = self.linearity;
        if ![c1, c2, c3].iter().all(|c| c.is_finite()) {
            return Err(ReductionError::InvalidConfig(format!(
                "linearity coefficients must be finite, got {}",
                self.linearity
            )));
        }
        if matches!(self.normalization, StatField::Npix | StatField::Stddev) {
            return Err(ReductionError::InvalidConfig(format!(
                "{} is not a level statistic for flat normalization",
                self.normalization
            )));
        }
        Ok(())
    }
}
