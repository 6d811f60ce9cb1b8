use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::consts::{EXTRACT_LIST_NAME, INDEF, MASTER_BIAS_STEM, RAW_FRAME_EXTENSIONS};
use crate::engine::ImageEngine;
use crate::error::{ReductionError, Result};
use crate::frame::{
    master_dark_stem, master_flat_stem, ExposureTime, FilterId, FrameType, ObservationRecord,
};
use crate::io::fs as rfs;
use crate::io::listing::WorkingList;

use super::ObservationCatalog;

/// Header fields queried for every raw frame, in record order.
pub const HEADER_FIELDS: [&str; 6] = ["$I", "OBJECT", "IMAGETYP", "FILTER", "EXPTIME", "AIRMASS"];

/// Raw frames directly inside `dir`, sorted by file name.
pub fn discover_raw_frames(dir: &Path) -> Result<Vec<PathBuf>> {
    let frames: Vec<PathBuf> = rfs::list_files(dir)?
        .into_iter()
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .map(|e| RAW_FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    debug!(dir = %dir.display(), count = frames.len(), "Raw frames discovered");
    Ok(frames)
}

/// Build the observation catalog of `frames`.
///
/// The frame list is handed to the engine through a working list in
/// `list_dir`, removed before returning unless `retain_list` is set.
pub fn extract_catalog(
    engine: &dyn ImageEngine,
    list_dir: &Path,
    frames: &[PathBuf],
    retain_list: bool,
) -> Result<ObservationCatalog> {
    if frames.is_empty() {
        return Err(ReductionError::metadata(
            list_dir.display().to_string(),
            "no raw frames found",
        ));
    }

    let list = WorkingList::materialize(list_dir, EXTRACT_LIST_NAME, frames.iter().cloned())?
        .retain(retain_list);
    let rows = engine.header_fields(&list, &HEADER_FIELDS)?;
    list.release()?;

    if rows.len() != frames.len() {
        return Err(ReductionError::metadata(
            list_dir.display().to_string(),
            format!(
                "engine returned {} header rows for {} frames",
                rows.len(),
                frames.len()
            ),
        ));
    }

    let mut records: Vec<ObservationRecord> = Vec::with_capacity(rows.len());
    for row in &rows {
        let record = parse_record(row)?;
        if records.iter().any(|r| r.name == record.name) {
            return Err(ReductionError::metadata(
                record.name,
                "two raw frames share this name",
            ));
        }
        debug!(
            name = %record.name,
            frame_type = %record.frame_type,
            exposure = %record.exposure_time,
            "Observation"
        );
        records.push(record);
    }

    check_master_names(&records)?;

    info!(frames = records.len(), "Observation catalog extracted");
    Ok(ObservationCatalog::new(records))
}

/// Parse one tab-delimited header row (see [`HEADER_FIELDS`]).
pub fn parse_record(row: &str) -> Result<ObservationRecord> {
    let columns: Vec<&str> = row.split('\t').map(str::trim).collect();
    let frame = columns.first().copied().unwrap_or_default();
    if columns.len() != HEADER_FIELDS.len() {
        return Err(ReductionError::metadata(
            frame,
            format!(
                "expected {} header fields, got {}",
                HEADER_FIELDS.len(),
                columns.len()
            ),
        ));
    }

    let name = Path::new(columns[0])
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ReductionError::metadata(frame, "frame has no name"))?;

    let object = required(&columns, 1, &name)?.to_string();
    let frame_type: FrameType = required(&columns, 2, &name)?
        .parse()
        .map_err(|e: String| ReductionError::metadata(name.as_str(), e))?;

    let filter = if frame_type.uses_filter() {
        let value = required(&columns, 3, &name)?;
        let filter = FilterId::new(value)
            .map_err(|e| ReductionError::metadata(name.as_str(), e.to_string()))?;
        Some(filter)
    } else {
        None
    };

    let exposure_time = required(&columns, 4, &name)?
        .parse::<f64>()
        .map_err(|_| {
            ReductionError::metadata(
                name.as_str(),
                format!("EXPTIME {:?} is not a number", columns[4]),
            )
        })
        .and_then(|seconds| {
            ExposureTime::new(seconds)
                .map_err(|e| ReductionError::metadata(name.as_str(), e.to_string()))
        })?;

    let airmass = match columns[5] {
        INDEF | "" => None,
        value => Some(value.parse::<f64>().map_err(|_| {
            ReductionError::metadata(name.as_str(), format!("AIRMASS {value:?} is not a number"))
        })?),
    };

    Ok(ObservationRecord {
        name,
        object,
        frame_type,
        filter,
        exposure_time,
        airmass,
    })
}

/// Master frames are written next to the raw frames they are built from,
/// so no raw frame may carry the name of a master in its directory.
fn check_master_names(records: &[ObservationRecord]) -> Result<()> {
    for record in records {
        let clash = match record.frame_type {
            FrameType::Bias => record.name == MASTER_BIAS_STEM,
            FrameType::Dark => records
                .iter()
                .filter(|r| r.frame_type == FrameType::Dark)
                .any(|r| record.name == master_dark_stem(r.exposure_time)),
            FrameType::Flat => record
                .filter
                .as_ref()
                .is_some_and(|filter| record.name == master_flat_stem(filter)),
            FrameType::Object => false,
        };
        if clash {
            return Err(ReductionError::metadata(
                record.name.as_str(),
                "name is reserved for a master frame",
            ));
        }
    }
    Ok(())
}

fn required<'a>(columns: &[&'a str], index: usize, frame: &str) -> Result<&'a str> {
    match columns[index] {
        INDEF => Err(ReductionError::metadata(
            frame,
            format!("missing {}", HEADER_FIELDS[index]),
        )),
        value => Ok(value),
    }
}
