use std::path::PathBuf;

use thiserror::Error;

use crate::calibrate::CalibrationStage;

#[derive(Error, Debug)]
pub enum ReductionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to {op} {path}: {source}")]
    Filesystem {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Metadata error in {frame}: {reason}")]
    Metadata { frame: String, reason: String },

    #[error(
        "The pipeline has already been run in {0}. Remove the previous output directories to run it again"
    )]
    AlreadyOrganized(PathBuf),

    #[error("{stage} failed for {frame}: {reason}")]
    Calibration {
        stage: CalibrationStage,
        frame: String,
        reason: String,
    },

    #[error("Engine {op} failed: {reason}")]
    Engine { op: &'static str, reason: String },

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Invalid FITS file: {0}")]
    Fits(String),

    #[error("Invalid trim section: {0}")]
    InvalidSection(String),

    #[error("Invalid filter identifier: {0:?}")]
    InvalidFilter(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Reduction declined by operator")]
    Declined,

    #[error("Empty frame list")]
    EmptySequence,
}

impl ReductionError {
    /// Wrap any failure of a calibration step for one frame.
    pub fn calibration(
        stage: CalibrationStage,
        frame: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::Calibration {
            stage,
            frame: frame.into(),
            reason: reason.to_string(),
        }
    }

    pub fn metadata(frame: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Metadata {
            frame: frame.into(),
            reason: reason.into(),
        }
    }

    pub fn engine(op: &'static str, reason: impl Into<String>) -> Self {
        Self::Engine {
            op,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReductionError>;
