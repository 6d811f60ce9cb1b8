//! Master bias, dark and flat builders.

use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::{group_by_exposure, ObservationCatalog};
use crate::consts::MASTER_BIAS_STEM;
use crate::error::{ReductionError, Result};
use crate::frame::{
    master_dark_stem, master_flat_stem, ExposureTime, FilterId, FrameFile, FrameType,
    ObservationRecord,
};
use crate::io::fs as rfs;
use crate::store::DirectoryLayout;

use super::{frame_statistics, CalibrationStage, Calibrator};

/// Raw frames of `records`, all stored in `dir`.
fn raw_frames(dir: &std::path::Path, records: &[&ObservationRecord]) -> Vec<FrameFile> {
    records
        .iter()
        .map(|record| FrameFile::new(dir, record.name.as_str()))
        .collect()
}

/// Trim all bias frames and combine them into `bias/mbias.fits`.
pub fn build_master_bias(
    cal: &Calibrator<'_>,
    layout: &DirectoryLayout,
    catalog: &ObservationCatalog,
) -> Result<FrameFile> {
    let records = catalog.of_type(FrameType::Bias);
    let output = FrameFile::new(layout.bias_dir(), MASTER_BIAS_STEM);
    if records.is_empty() {
        return Err(ReductionError::calibration(
            CalibrationStage::Combine,
            output.stem(),
            "no bias frames in the catalog",
        ));
    }

    let trimmed = cal.trim(&raw_frames(&layout.bias_dir(), &records))?;
    cal.combine(&trimmed, &output)?;
    info!(frames = records.len(), output = %output, "Master bias built");
    cal.show(&output);
    Ok(output)
}

/// One master dark and the exposure time it belongs to.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MasterDark {
    pub exposure_time: ExposureTime,
    #[serde(serialize_with = "serialize_frame")]
    pub file: FrameFile,
    pub frames: usize,
}

/// All master darks of a run, one per distinct dark exposure time.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MasterDarks {
    darks: Vec<MasterDark>,
}

impl MasterDarks {
    pub fn iter(&self) -> impl Iterator<Item = &MasterDark> {
        self.darks.iter()
    }

    pub fn len(&self) -> usize {
        self.darks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.darks.is_empty()
    }

    /// Master dark of exactly `exposure_time`, if one was built.
    pub fn find(&self, exposure_time: ExposureTime) -> Option<&FrameFile> {
        self.darks
            .iter()
            .find(|d| d.exposure_time == exposure_time)
            .map(|d| &d.file)
    }

    pub fn exposure_times(&self) -> Vec<ExposureTime> {
        self.darks.iter().map(|d| d.exposure_time).collect()
    }
}

/// Trim, bias-subtract and linearize all darks, then combine each exposure
/// time group into `dark/dark<exptime>.fits`.
///
/// A run without dark frames yields an empty library.
pub fn build_master_darks(
    cal: &Calibrator<'_>,
    layout: &DirectoryLayout,
    catalog: &ObservationCatalog,
    master_bias: &FrameFile,
) -> Result<MasterDarks> {
    let records = catalog.of_type(FrameType::Dark);
    if records.is_empty() {
        warn!("No dark frames, objects will not be dark-subtracted");
        return Ok(MasterDarks::default());
    }

    let dir = layout.dark_dir();
    let trimmed = cal.trim(&raw_frames(&dir, &records))?;
    let debiased = cal.subtract_bias(&trimmed, master_bias)?;
    let linearized = cal.linearize(&debiased)?;

    let mut darks = Vec::new();
    for group in group_by_exposure(records.iter().copied()) {
        let members: Vec<FrameFile> = linearized
            .iter()
            .filter(|frame| group.names.iter().any(|name| name == frame.name()))
            .cloned()
            .collect();
        let output = FrameFile::new(&dir, master_dark_stem(group.exposure_time));
        cal.combine(&members, &output)?;
        info!(
            exposure = %group.exposure_time,
            frames = members.len(),
            output = %output,
            "Master dark built"
        );
        cal.show(&output);
        darks.push(MasterDark {
            exposure_time: group.exposure_time,
            file: output,
            frames: members.len(),
        });
    }
    Ok(MasterDarks { darks })
}

/// Build `<filter>/flats/mflat<filter>.fits`: trim, bias-subtract,
/// linearize, normalize every flat by its own statistic, combine.
///
/// Returns `None` when the filter has no flats.
pub fn build_master_flat(
    cal: &Calibrator<'_>,
    layout: &DirectoryLayout,
    catalog: &ObservationCatalog,
    filter: &FilterId,
    master_bias: &FrameFile,
) -> Result<Option<FrameFile>> {
    let dir = layout.flats_dir(filter);
    let records = catalog.of_type_and_filter(FrameType::Flat, filter);
    if records.is_empty() || rfs::is_empty_dir(&dir)? {
        warn!(filter = %filter, "No flats, master flat skipped");
        return Ok(None);
    }

    let trimmed = cal.trim(&raw_frames(&dir, &records))?;
    let debiased = cal.subtract_bias(&trimmed, master_bias)?;
    let linearized = cal.linearize(&debiased)?;
    let levels = frame_statistics(cal.engine(), &linearized, cal.settings().normalization)?;
    let normalized = cal.normalize_flats(&linearized, &levels)?;

    let output = FrameFile::new(&dir, master_flat_stem(filter));
    cal.combine(&normalized, &output)?;
    info!(filter = %filter, frames = records.len(), output = %output, "Master flat built");
    cal.show(&output);
    Ok(Some(output))
}

fn serialize_frame<S: serde::Serializer>(frame: &FrameFile, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(&frame.path().display())
}
