use std::path::PathBuf;

use serde::Serialize;

use crate::error::Result;
use crate::frame::{ExposureTime, FilterId};
use crate::store::Organized;

/// Reduction stage, used for the controller state and progress reporting.
///
/// Stages run strictly in declaration order; `Aborted` is reachable from
/// any stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ReductionStage {
    Init,
    Organize,
    MasterBias,
    MasterDark,
    MasterFlat,
    CalibrateObjects,
    Done,
    Aborted,
}

impl ReductionStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }
}

impl std::fmt::Display for ReductionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Init => write!(f, "Reading headers"),
            Self::Organize => write!(f, "Organizing frames"),
            Self::MasterBias => write!(f, "Building master bias"),
            Self::MasterDark => write!(f, "Building master darks"),
            Self::MasterFlat => write!(f, "Building master flats"),
            Self::CalibrateObjects => write!(f, "Calibrating objects"),
            Self::Done => write!(f, "Done"),
            Self::Aborted => write!(f, "Aborted"),
        }
    }
}

/// Thread-safe progress reporting for the reduction.
///
/// All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A new stage has started. `total_items` is the number of work items in
    /// this stage (filters, exposure groups), if known.
    fn begin_stage(&self, _stage: ReductionStage, _total_items: Option<usize>) {}

    /// One work item within the current stage has completed.
    fn advance(&self, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}
}

/// No-op progress reporter, used when `run_reduction` delegates.
pub(super) struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}

/// The single suspension point between organizing and calibrating.
pub trait Confirmation {
    /// `Ok(true)` resumes the run, `Ok(false)` aborts it.
    fn confirm(&self, organized: &Organized) -> Result<bool>;
}

/// Unattended answer to the confirmation point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AutoProceed(pub bool);

impl Confirmation for AutoProceed {
    fn confirm(&self, _organized: &Organized) -> Result<bool> {
        Ok(self.0)
    }
}

/// A missing calibration group. The run takes the fallback path and keeps
/// going.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum EmptyGroupWarning {
    /// No flats for this filter: no master flat, its objects are skipped.
    NoFlats { filter: FilterId },
    /// No master dark for this exposure time: the object is flat-fielded
    /// without dark subtraction.
    NoMatchingDark {
        frame: String,
        exposure_time: ExposureTime,
    },
}

impl std::fmt::Display for EmptyGroupWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoFlats { filter } => {
                write!(f, "No flats for filter {filter}, its objects were not calibrated")
            }
            Self::NoMatchingDark {
                frame,
                exposure_time,
            } => write!(
                f,
                "No master dark for {exposure_time} s, {frame} was not dark-subtracted"
            ),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DarkProduct {
    pub exposure_time: ExposureTime,
    pub path: PathBuf,
    pub frames: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FlatProduct {
    pub filter: FilterId,
    pub path: PathBuf,
}

/// One fully calibrated object frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CalibratedFrame {
    pub name: String,
    pub filter: FilterId,
    pub exposure_time: ExposureTime,
    pub dark_subtracted: bool,
    pub path: PathBuf,
}

/// What a reduction run produced.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ReductionReport {
    pub filters: Vec<FilterId>,
    pub master_bias: Option<PathBuf>,
    pub master_darks: Vec<DarkProduct>,
    pub master_flats: Vec<FlatProduct>,
    pub calibrated: Vec<CalibratedFrame>,
    pub warnings: Vec<EmptyGroupWarning>,
}

impl ReductionReport {
    pub fn master_flat(&self, filter: &FilterId) -> Option<&FlatProduct> {
        self.master_flats.iter().find(|f| &f.filter == filter)
    }

    pub fn calibrated_in(&self, filter: &FilterId) -> impl Iterator<Item = &CalibratedFrame> {
        let filter = filter.clone();
        self.calibrated.iter().filter(move |c| c.filter == filter)
    }
}
