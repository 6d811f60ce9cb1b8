//! Calibration stages. Each stage maps frame files to new frame files one
//! suffix further down the chain and delegates the pixel work to the
//! engine. Stage ordering is the pipeline controller's job; a stage only
//! checks that its inputs exist.

pub mod masters;
pub mod stats;

use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use crate::consts::{COMBINE_LIST_NAME, DISPLAY_SLOT};
use crate::engine::{
    CombineParams, ImageEngine, LinearityCoefficients, Operand, Operator, StatField, TrimSection,
};
use crate::error::{ReductionError, Result};
use crate::frame::FrameFile;
use crate::io::listing::WorkingList;

pub use masters::{build_master_bias, build_master_darks, build_master_flat, MasterDark, MasterDarks};
pub use stats::frame_statistics;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CalibrationStage {
    Trim,
    BiasSubtract,
    Linearize,
    DarkSubtract,
    FlatNormalize,
    FlatDivide,
    Combine,
    Statistics,
}

impl CalibrationStage {
    /// Suffix appended to the file name by stages that produce one file per
    /// input frame.
    pub fn suffix(&self) -> Option<&'static str> {
        match self {
            Self::Trim => Some("trim"),
            Self::BiasSubtract => Some("bias"),
            Self::Linearize => Some("lin"),
            Self::DarkSubtract => Some("dark"),
            Self::FlatNormalize => Some("norm"),
            Self::FlatDivide => Some("flat"),
            Self::Combine | Self::Statistics => None,
        }
    }
}

impl std::fmt::Display for CalibrationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trim => write!(f, "Trim"),
            Self::BiasSubtract => write!(f, "Bias subtraction"),
            Self::Linearize => write!(f, "Linearization"),
            Self::DarkSubtract => write!(f, "Dark subtraction"),
            Self::FlatNormalize => write!(f, "Flat normalization"),
            Self::FlatDivide => write!(f, "Flat division"),
            Self::Combine => write!(f, "Combine"),
            Self::Statistics => write!(f, "Statistics"),
        }
    }
}

/// Run-wide calibration parameters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CalibrationSettings {
    /// Section every frame is cropped to. All frames share one geometry.
    pub trim: TrimSection,
    pub linearity: LinearityCoefficients,
    pub combine: CombineParams,
    /// Statistic each flat is divided by before combining.
    pub normalization: StatField,
}

/// Applies calibration stages through an engine.
pub struct Calibrator<'a> {
    engine: &'a dyn ImageEngine,
    settings: CalibrationSettings,
    display: bool,
    retain_lists: bool,
}

impl<'a> Calibrator<'a> {
    pub fn new(engine: &'a dyn ImageEngine, settings: CalibrationSettings) -> Self {
        Self {
            engine,
            settings,
            display: false,
            retain_lists: false,
        }
    }

    /// Show every master frame once it is built.
    pub fn with_display(mut self, display: bool) -> Self {
        self.display = display;
        self
    }

    /// Keep combine working lists on disk (debug runs).
    pub fn with_retained_lists(mut self, retain: bool) -> Self {
        self.retain_lists = retain;
        self
    }

    pub fn engine(&self) -> &dyn ImageEngine {
        self.engine
    }

    pub fn settings(&self) -> &CalibrationSettings {
        &self.settings
    }

    /// Crop every frame to the configured section (`.trim`).
    pub fn trim(&self, frames: &[FrameFile]) -> Result<Vec<FrameFile>> {
        let section = self.settings.trim;
        self.map_frames(CalibrationStage::Trim, frames, |input, output| {
            self.engine.copy_region(input, &section, output)
        })
    }

    /// `out = in - master_bias` (`.bias`).
    pub fn subtract_bias(&self, frames: &[FrameFile], master_bias: &FrameFile) -> Result<Vec<FrameFile>> {
        let stage = CalibrationStage::BiasSubtract;
        require(stage, master_bias)?;
        let bias = Operand::Frame(master_bias.path());
        self.map_frames(stage, frames, |input, output| {
            self.engine.arithmetic(
                &Operand::Frame(input.to_path_buf()),
                Operator::Subtract,
                &bias,
                output,
            )
        })
    }

    /// Nonlinearity correction with the run-wide coefficients (`.lin`).
    pub fn linearize(&self, frames: &[FrameFile]) -> Result<Vec<FrameFile>> {
        let coeffs = self.settings.linearity;
        self.map_frames(CalibrationStage::Linearize, frames, |input, output| {
            self.engine.linearize(input, output, &coeffs)
        })
    }

    /// `out = in - master_dark` (`.dark`). The caller picks the master dark
    /// of the frame's own exposure time.
    pub fn subtract_dark(&self, frame: &FrameFile, master_dark: &FrameFile) -> Result<FrameFile> {
        let stage = CalibrationStage::DarkSubtract;
        require(stage, master_dark)?;
        let dark = Operand::Frame(master_dark.path());
        self.apply(stage, frame, |input, output| {
            self.engine.arithmetic(
                &Operand::Frame(input.to_path_buf()),
                Operator::Subtract,
                &dark,
                output,
            )
        })
    }

    /// Divide each flat by its own level (`.norm`). `levels[i]` belongs to
    /// `frames[i]`.
    pub fn normalize_flats(&self, frames: &[FrameFile], levels: &[f64]) -> Result<Vec<FrameFile>> {
        let stage = CalibrationStage::FlatNormalize;
        if frames.len() != levels.len() {
            return Err(ReductionError::calibration(
                stage,
                frames.first().map(FrameFile::stem).unwrap_or_default(),
                format!("{} frames but {} levels", frames.len(), levels.len()),
            ));
        }
        frames
            .iter()
            .zip(levels)
            .map(|(frame, &level)| {
                self.apply(stage, frame, |input, output| {
                    self.engine.arithmetic(
                        &Operand::Frame(input.to_path_buf()),
                        Operator::Divide,
                        &Operand::Scalar(level),
                        output,
                    )
                })
            })
            .collect()
    }

    /// `out = in / master_flat` (`.flat`).
    pub fn divide_flat(&self, frame: &FrameFile, master_flat: &FrameFile) -> Result<FrameFile> {
        let stage = CalibrationStage::FlatDivide;
        require(stage, master_flat)?;
        let flat = Operand::Frame(master_flat.path());
        self.apply(stage, frame, |input, output| {
            self.engine.arithmetic(
                &Operand::Frame(input.to_path_buf()),
                Operator::Divide,
                &flat,
                output,
            )
        })
    }

    /// Combine `frames` into `output` through a working list placed next to
    /// the output. The list is removed on every exit path. An existing
    /// `output` is never replaced.
    pub fn combine(&self, frames: &[FrameFile], output: &FrameFile) -> Result<()> {
        let stage = CalibrationStage::Combine;
        if frames.is_empty() {
            return Err(ReductionError::calibration(stage, output.stem(), "no input frames"));
        }
        for frame in frames {
            require(stage, frame)?;
        }
        if output.exists() {
            return Err(ReductionError::calibration(
                stage,
                output.stem(),
                "output already exists",
            ));
        }
        let list = WorkingList::materialize(
            output.dir(),
            &combine_list_name(output),
            frames.iter().map(FrameFile::path),
        )?
        .retain(self.retain_lists);

        self.engine
            .combine(&list, &output.path(), &self.settings.combine)
            .map_err(|e| ReductionError::calibration(stage, output.stem(), e))?;
        list.release()?;

        if !output.exists() {
            return Err(ReductionError::calibration(
                stage,
                output.stem(),
                "engine produced no output",
            ));
        }
        debug!(output = %output, frames = frames.len(), "Combined");
        Ok(())
    }

    /// Best-effort display of a finished product.
    pub fn show(&self, frame: &FrameFile) {
        if !self.display {
            return;
        }
        if let Err(e) = self.engine.display(&frame.path(), DISPLAY_SLOT) {
            warn!(frame = %frame, error = %e, "Display failed");
        }
    }

    fn map_frames<F>(&self, stage: CalibrationStage, frames: &[FrameFile], op: F) -> Result<Vec<FrameFile>>
    where
        F: Fn(&Path, &Path) -> Result<()>,
    {
        frames.iter().map(|frame| self.apply(stage, frame, &op)).collect()
    }

    /// Run one per-frame step: check the input, derive the output name, call
    /// the engine, check the output.
    fn apply<F>(&self, stage: CalibrationStage, frame: &FrameFile, op: F) -> Result<FrameFile>
    where
        F: Fn(&Path, &Path) -> Result<()>,
    {
        require(stage, frame)?;
        let suffix = stage
            .suffix()
            .ok_or_else(|| ReductionError::calibration(stage, frame.stem(), "stage has no output suffix"))?;
        let output = frame.derive(suffix);
        op(&frame.path(), &output.path())
            .map_err(|e| ReductionError::calibration(stage, frame.stem(), e))?;
        if !output.exists() {
            return Err(ReductionError::calibration(
                stage,
                frame.stem(),
                "engine produced no output",
            ));
        }
        debug!(stage = %stage, output = %output, "Frame calibrated");
        Ok(output)
    }
}

/// Fail with a calibration error if a required input is missing.
fn require(stage: CalibrationStage, frame: &FrameFile) -> Result<()> {
    if frame.exists() {
        Ok(())
    } else {
        Err(ReductionError::calibration(
            stage,
            frame.stem(),
            format!("missing input {}", frame.path().display()),
        ))
    }
}

/// Working list name for the combine producing `output`, e.g. `tmp_inp_dark60`.
pub fn combine_list_name(output: &FrameFile) -> String {
    format!("{COMBINE_LIST_NAME}_{}", output.stem())
}
