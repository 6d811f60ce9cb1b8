use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use ndarray::Array2;

use ccdred_core::engine::{
    CombineParams, ImageEngine, LinearityCoefficients, NativeEngine, Operand, Operator, StatField,
    TrimSection,
};
use ccdred_core::error::{ReductionError, Result};
use ccdred_core::frame::{ExposureTime, FilterId, FrameType, ObservationRecord};
use ccdred_core::io::fits::{write_fits, FitsHeader, FitsImage, HeaderValue};
use ccdred_core::io::listing::WorkingList;

/// Side length of every synthetic raw frame.
pub const FRAME_SIZE: usize = 8;

/// Trim section used with synthetic frames: drops a 1-pixel border.
pub fn test_trim() -> TrimSection {
    TrimSection::new(2, 7, 2, 7).unwrap()
}

/// Description of one synthetic raw frame.
#[derive(Clone, Debug)]
pub struct RawFrame {
    pub name: String,
    pub object: String,
    pub imagetyp: String,
    pub filter: Option<String>,
    pub exptime: f64,
    pub value: f32,
}

impl RawFrame {
    pub fn new(name: &str, imagetyp: &str, exptime: f64, value: f32) -> Self {
        Self {
            name: name.into(),
            object: name.into(),
            imagetyp: imagetyp.into(),
            filter: None,
            exptime,
            value,
        }
    }

    pub fn bias(name: &str, value: f32) -> Self {
        Self::new(name, "Bias", 0.0, value)
    }

    pub fn dark(name: &str, exptime: f64, value: f32) -> Self {
        Self::new(name, "Dark", exptime, value)
    }

    pub fn flat(name: &str, filter: &str, value: f32) -> Self {
        Self::new(name, "Flat", 5.0, value).with_filter(filter)
    }

    pub fn object(name: &str, filter: &str, exptime: f64, value: f32) -> Self {
        Self::new(name, "Object", exptime, value).with_filter(filter)
    }

    pub fn with_filter(mut self, filter: &str) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn header(&self) -> FitsHeader {
        let mut header = FitsHeader::new();
        header.set("OBJECT", HeaderValue::Str(self.object.clone()));
        header.set("IMAGETYP", HeaderValue::Str(self.imagetyp.clone()));
        if let Some(ref filter) = self.filter {
            header.set("FILTER", HeaderValue::Str(filter.clone()));
        }
        header.set("EXPTIME", HeaderValue::Float(self.exptime));
        header.set("AIRMASS", HeaderValue::Float(1.25));
        header
    }

    /// Write `<dir>/<name>.fits` filled with the frame's constant value.
    pub fn write(&self, dir: &Path) -> PathBuf {
        let path = dir.join(format!("{}.fits", self.name));
        let data = Array2::from_elem((FRAME_SIZE, FRAME_SIZE), self.value);
        write_fits(&path, &FitsImage::new(self.header(), data)).unwrap();
        path
    }
}

pub fn write_all(dir: &Path, frames: &[RawFrame]) -> Vec<PathBuf> {
    frames.iter().map(|f| f.write(dir)).collect()
}

/// 5 bias, 3 darks (60, 60, 120 s), 2 flats each in V and R, and 3 objects
/// each in V and R at 60, 60 and 600 s.
pub fn night_frames() -> Vec<RawFrame> {
    let mut frames = Vec::new();
    for i in 1..=5 {
        frames.push(RawFrame::bias(&format!("bias{i}"), 100.0));
    }
    frames.push(RawFrame::dark("darkA", 60.0, 110.0));
    frames.push(RawFrame::dark("darkB", 60.0, 110.0));
    frames.push(RawFrame::dark("darkC", 120.0, 120.0));
    for filter in ["V", "R"] {
        frames.push(RawFrame::flat(&format!("flat{filter}1"), filter, 5100.0));
        frames.push(RawFrame::flat(&format!("flat{filter}2"), filter, 5100.0));
        frames.push(RawFrame::object(&format!("m31{filter}1"), filter, 60.0, 1200.0));
        frames.push(RawFrame::object(&format!("m31{filter}2"), filter, 60.0, 1200.0));
        frames.push(RawFrame::object(&format!("m31{filter}3"), filter, 600.0, 1200.0));
    }
    frames
}

pub fn record(name: &str, frame_type: FrameType, filter: Option<&str>, exptime: f64) -> ObservationRecord {
    ObservationRecord {
        name: name.into(),
        object: name.into(),
        frame_type,
        filter: filter.map(|f| FilterId::new(f).unwrap()),
        exposure_time: ExposureTime::new(exptime).unwrap(),
        airmass: None,
    }
}

/// Every path below `root`, relative to it.
pub fn tree(root: &Path) -> BTreeSet<PathBuf> {
    fn walk(root: &Path, dir: &Path, out: &mut BTreeSet<PathBuf>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            out.insert(path.strip_prefix(root).unwrap().to_path_buf());
            if path.is_dir() {
                walk(root, &path, out);
            }
        }
    }
    let mut out = BTreeSet::new();
    walk(root, root, &mut out);
    out
}

/// The irlincor polynomial, for expected values.
pub fn linearized(value: f32, coeffs: &LinearityCoefficients) -> f32 {
    let x = value / 32767.0;
    value * (coeffs.c1 as f32 + coeffs.c2 as f32 * x + coeffs.c3 as f32 * x * x)
}

/// One engine call as seen by [`RecordingEngine`].
#[derive(Clone, Debug, PartialEq)]
pub enum EngineCall {
    HeaderFields { files: usize },
    Combine { inputs: Vec<PathBuf>, output: PathBuf, list_existed: bool },
    Arithmetic { a: Operand, op: Operator, b: Operand, output: PathBuf },
    Linearize { input: PathBuf, output: PathBuf },
    CopyRegion { input: PathBuf, output: PathBuf },
    Statistic { path: PathBuf },
    Display { path: PathBuf },
}

impl EngineCall {
    pub fn output(&self) -> Option<&Path> {
        match self {
            Self::Combine { output, .. }
            | Self::Arithmetic { output, .. }
            | Self::Linearize { output, .. }
            | Self::CopyRegion { output, .. } => Some(output),
            _ => None,
        }
    }
}

/// Engine double that records every call and delegates the pixel work to
/// the native engine. `fail_on` makes one kind of call fail.
#[derive(Default)]
pub struct RecordingEngine {
    inner: NativeEngine,
    calls: RefCell<Vec<EngineCall>>,
    fail_on: Option<&'static str>,
    fail_display: bool,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(op: &'static str) -> Self {
        Self {
            fail_on: Some(op),
            ..Self::default()
        }
    }

    pub fn with_failing_display() -> Self {
        Self {
            fail_display: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.borrow().clone()
    }

    /// File names of every produced output, in call order.
    pub fn output_names(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter_map(EngineCall::output)
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    /// Index of the call that produced the file named `file_name`.
    pub fn position_of(&self, file_name: &str) -> Option<usize> {
        self.calls.borrow().iter().position(|c| {
            c.output()
                .and_then(|p| p.file_name())
                .is_some_and(|n| n == file_name)
        })
    }

    pub fn count(&self, pred: impl Fn(&EngineCall) -> bool) -> usize {
        self.calls.borrow().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: EngineCall, op: &'static str) -> Result<()> {
        self.calls.borrow_mut().push(call);
        if self.fail_on == Some(op) {
            return Err(ReductionError::engine(op, "injected failure"));
        }
        Ok(())
    }
}

impl ImageEngine for RecordingEngine {
    fn name(&self) -> &str {
        "recording"
    }

    fn header_fields(&self, list: &WorkingList, fields: &[&str]) -> Result<Vec<String>> {
        self.record(EngineCall::HeaderFields { files: list.len() }, "header_fields")?;
        self.inner.header_fields(list, fields)
    }

    fn combine(&self, list: &WorkingList, output: &Path, params: &CombineParams) -> Result<()> {
        let call = EngineCall::Combine {
            inputs: list.entries().to_vec(),
            output: output.to_path_buf(),
            list_existed: list.path().is_file(),
        };
        self.record(call, "combine")?;
        self.inner.combine(list, output, params)
    }

    fn arithmetic(&self, a: &Operand, op: Operator, b: &Operand, output: &Path) -> Result<()> {
        let call = EngineCall::Arithmetic {
            a: a.clone(),
            op,
            b: b.clone(),
            output: output.to_path_buf(),
        };
        self.record(call, "arithmetic")?;
        self.inner.arithmetic(a, op, b, output)
    }

    fn linearize(&self, input: &Path, output: &Path, coeffs: &LinearityCoefficients) -> Result<()> {
        let call = EngineCall::Linearize {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
        };
        self.record(call, "linearize")?;
        self.inner.linearize(input, output, coeffs)
    }

    fn copy_region(&self, input: &Path, region: &TrimSection, output: &Path) -> Result<()> {
        let call = EngineCall::CopyRegion {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
        };
        self.record(call, "copy_region")?;
        self.inner.copy_region(input, region, output)
    }

    fn statistic(&self, path: &Path, field: StatField) -> Result<f64> {
        self.record(EngineCall::Statistic { path: path.to_path_buf() }, "statistic")?;
        self.inner.statistic(path, field)
    }

    fn display(&self, path: &Path, _frame_slot: u32) -> Result<()> {
        self.calls.borrow_mut().push(EngineCall::Display {
            path: path.to_path_buf(),
        });
        if self.fail_display {
            return Err(ReductionError::engine("display", "no display available"));
        }
        Ok(())
    }
}
