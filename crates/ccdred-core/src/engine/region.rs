use std::ops::Range;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::consts::DEFAULT_TRIM_SECTION;
use crate::error::{ReductionError, Result};

/// Rectangular image section in IRAF notation, `[x1:x2,y1:y2]`.
/// Coordinates are 1-based and inclusive; x runs along columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TrimSection {
    pub x1: usize,
    pub x2: usize,
    pub y1: usize,
    pub y2: usize,
}

impl TrimSection {
    pub fn new(x1: usize, x2: usize, y1: usize, y2: usize) -> Result<Self> {
        if x1 == 0 || y1 == 0 {
            return Err(ReductionError::InvalidSection(
                "section coordinates are 1-based".into(),
            ));
        }
        if x2 < x1 || y2 < y1 {
            return Err(ReductionError::InvalidSection(format!(
                "[{x1}:{x2},{y1}:{y2}] has an empty extent"
            )));
        }
        Ok(Self { x1, x2, y1, y2 })
    }

    pub fn width(&self) -> usize {
        self.x2 - self.x1 + 1
    }

    pub fn height(&self) -> usize {
        self.y2 - self.y1 + 1
    }

    /// Zero-based (row, column) ranges, checked against the image size.
    pub fn validated(&self, width: usize, height: usize) -> Result<(Range<usize>, Range<usize>)> {
        if self.x2 > width || self.y2 > height {
            return Err(ReductionError::InvalidSection(format!(
                "{self} exceeds image dimensions ({width}x{height})"
            )));
        }
        Ok((self.y1 - 1..self.y2, self.x1 - 1..self.x2))
    }
}

impl Default for TrimSection {
    fn default() -> Self {
        Self {
            x1: 100,
            x2: 3996,
            y1: 100,
            y2: 3996,
        }
    }
}

impl std::fmt::Display for TrimSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}:{},{}:{}]", self.x1, self.x2, self.y1, self.y2)
    }
}

impl FromStr for TrimSection {
    type Err = ReductionError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || {
            ReductionError::InvalidSection(format!(
                "{s:?} is not of the form {DEFAULT_TRIM_SECTION}"
            ))
        };
        let inner = s
            .trim()
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(invalid)?;
        let (xs, ys) = inner.split_once(',').ok_or_else(invalid)?;
        let parse_range = |range: &str| -> Result<(usize, usize)> {
            let (lo, hi) = range.split_once(':').ok_or_else(invalid)?;
            let lo = lo.trim().parse().map_err(|_| invalid())?;
            let hi = hi.trim().parse().map_err(|_| invalid())?;
            Ok((lo, hi))
        };
        let (x1, x2) = parse_range(xs)?;
        let (y1, y2) = parse_range(ys)?;
        Self::new(x1, x2, y1, y2)
    }
}

impl TryFrom<String> for TrimSection {
    type Error = ReductionError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TrimSection> for String {
    fn from(value: TrimSection) -> Self {
        value.to_string()
    }
}
