use tracing::{info, warn};

use crate::calibrate::{Calibrator, MasterDarks};
use crate::catalog::ObservationCatalog;
use crate::error::Result;
use crate::frame::{FilterId, FrameFile, FrameType};
use crate::io::fs as rfs;
use crate::store::DirectoryLayout;

use super::types::{CalibratedFrame, EmptyGroupWarning};

#[derive(Debug, Default)]
pub(super) struct ObjectBatch {
    pub calibrated: Vec<CalibratedFrame>,
    pub warnings: Vec<EmptyGroupWarning>,
}

/// Calibrate every object frame of `filter` and move the results into
/// `<filter>/objects/final/`.
///
/// Trim, bias subtraction and linearization run over the whole batch first.
/// Each frame is then dark-subtracted with the master dark of its own
/// exposure time, when there is one, and divided by the master flat.
pub(super) fn calibrate_objects(
    cal: &Calibrator<'_>,
    layout: &DirectoryLayout,
    catalog: &ObservationCatalog,
    filter: &FilterId,
    master_bias: &FrameFile,
    darks: &MasterDarks,
    master_flat: &FrameFile,
) -> Result<ObjectBatch> {
    let records = catalog.of_type_and_filter(FrameType::Object, filter);
    let mut batch = ObjectBatch::default();
    if records.is_empty() {
        return Ok(batch);
    }

    let dir = layout.objects_dir(filter);
    let raw: Vec<FrameFile> = records
        .iter()
        .map(|record| FrameFile::new(&dir, record.name.as_str()))
        .collect();
    let trimmed = cal.trim(&raw)?;
    let debiased = cal.subtract_bias(&trimmed, master_bias)?;
    let linearized = cal.linearize(&debiased)?;

    let final_dir = layout.final_dir(filter);
    rfs::create_dir(&final_dir)?;

    for (record, frame) in records.iter().zip(&linearized) {
        let (input, dark_subtracted) = match darks.find(record.exposure_time) {
            Some(master_dark) => (cal.subtract_dark(frame, master_dark)?, true),
            None => {
                warn!(
                    frame = %record.name,
                    exposure = %record.exposure_time,
                    "No master dark for this exposure time, dark subtraction skipped"
                );
                batch.warnings.push(EmptyGroupWarning::NoMatchingDark {
                    frame: record.name.clone(),
                    exposure_time: record.exposure_time,
                });
                (frame.clone(), false)
            }
        };
        let flattened = cal.divide_flat(&input, master_flat)?;
        let path = rfs::move_into(&flattened.path(), &final_dir)?;
        batch.calibrated.push(CalibratedFrame {
            name: record.name.clone(),
            filter: filter.clone(),
            exposure_time: record.exposure_time,
            dark_subtracted,
            path,
        });
    }

    info!(filter = %filter, frames = batch.calibrated.len(), "Objects calibrated");
    Ok(batch)
}
