use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::consts::{FITS_EXTENSION, MASTER_DARK_PREFIX, MASTER_FLAT_PREFIX};
use crate::error::{ReductionError, Result};

/// Kind of raw exposure, as declared by the `IMAGETYP` header keyword.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameType {
    Bias,
    Dark,
    Flat,
    Object,
}

impl FrameType {
    /// Bias and dark frames are filter-independent.
    pub fn uses_filter(&self) -> bool {
        matches!(self, Self::Flat | Self::Object)
    }
}

impl std::fmt::Display for FrameType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bias => write!(f, "Bias"),
            Self::Dark => write!(f, "Dark"),
            Self::Flat => write!(f, "Flat"),
            Self::Object => write!(f, "Object"),
        }
    }
}

impl FromStr for FrameType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bias" | "zero" | "bias frame" => Ok(Self::Bias),
            "dark" | "dark frame" => Ok(Self::Dark),
            "flat" | "flat field" | "flatfield" | "flat frame" => Ok(Self::Flat),
            "object" | "light" | "light frame" => Ok(Self::Object),
            other => Err(format!("unknown frame type {other:?}")),
        }
    }
}

/// Validated filter name. It doubles as a directory name, so it must be
/// non-empty and free of path separators.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FilterId(String);

impl FilterId {
    pub fn new(name: impl AsRef<str>) -> Result<Self> {
        let name = name.as_ref().trim();
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\', '\0'])
            && !name.chars().any(char::is_whitespace);
        if valid {
            Ok(Self(name.to_string()))
        } else {
            Err(ReductionError::InvalidFilter(name.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FilterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for FilterId {
    type Error = ReductionError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<FilterId> for String {
    fn from(value: FilterId) -> Self {
        value.0
    }
}

/// Exposure duration in seconds.
///
/// Equality is exact: a dark only matches an object whose recorded exposure
/// time is bit-for-bit the same value.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct ExposureTime(f64);

impl ExposureTime {
    pub fn new(seconds: f64) -> Result<Self> {
        if seconds.is_finite() && seconds >= 0.0 {
            // Normalize -0.0 so it cannot differ from 0.0 in file names.
            Ok(Self(seconds.abs()))
        } else {
            Err(ReductionError::InvalidConfig(format!(
                "exposure time must be a non-negative number, got {seconds}"
            )))
        }
    }

    pub fn seconds(&self) -> f64 {
        self.0
    }
}

impl std::fmt::Display for ExposureTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<f64> for ExposureTime {
    type Error = ReductionError;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ExposureTime> for f64 {
    fn from(value: ExposureTime) -> Self {
        value.0
    }
}

/// Header summary of one raw frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    /// File stem of the raw frame, without directory or extension.
    pub name: String,
    pub object: String,
    pub frame_type: FrameType,
    /// Always `None` for bias and dark frames.
    pub filter: Option<FilterId>,
    pub exposure_time: ExposureTime,
    /// Advisory only.
    pub airmass: Option<f64>,
}

/// Stem of the master dark combined from `exposure_time` darks.
pub fn master_dark_stem(exposure_time: ExposureTime) -> String {
    format!("{MASTER_DARK_PREFIX}{exposure_time}")
}

/// Stem of the master flat of `filter`.
pub fn master_flat_stem(filter: &FilterId) -> String {
    format!("{MASTER_FLAT_PREFIX}{filter}")
}

/// One frame artifact at some point of the calibration chain.
///
/// The on-disk name is `<name><suffix chain>.fits`. Deriving a new file
/// appends exactly one suffix and never touches the original.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameFile {
    dir: PathBuf,
    name: String,
    suffixes: Vec<&'static str>,
}

impl FrameFile {
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
            suffixes: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn suffixes(&self) -> &[&'static str] {
        &self.suffixes
    }

    /// File stem including the suffix chain, e.g. `obj1.trim.bias`.
    pub fn stem(&self) -> String {
        let mut stem = self.name.clone();
        for suffix in &self.suffixes {
            stem.push('.');
            stem.push_str(suffix);
        }
        stem
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}", self.stem(), FITS_EXTENSION)
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(self.file_name())
    }

    /// The artifact one stage further down the chain.
    pub fn derive(&self, suffix: &'static str) -> Self {
        let mut next = self.clone();
        next.suffixes.push(suffix);
        next
    }

    /// Same file name, different directory.
    pub fn relocated(&self, dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            name: self.name.clone(),
            suffixes: self.suffixes.clone(),
        }
    }

    pub fn exists(&self) -> bool {
        self.path().is_file()
    }
}

impl std::fmt::Display for FrameFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path().display())
    }
}
