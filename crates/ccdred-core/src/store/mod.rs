//! Directory layout of a working directory and the one-shot organize step
//! that sorts raw frames into it.

pub mod marker;

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::catalog::ObservationCatalog;
use crate::consts::{
    BIAS_DIR, DARK_DIR, FINAL_DIR, FITS_EXTENSION, FLATS_DIR, OBJECTS_DIR, PREVIEW_DIR,
    RAW_FRAME_EXTENSIONS,
};
use crate::error::{ReductionError, Result};
use crate::frame::{FilterId, FrameType, ObservationRecord};
use crate::io::fs as rfs;

pub use marker::{MarkerState, OrganizeTicket, RunMarker};

/// Where every kind of frame lives below the working directory:
/// `bias/`, `dark/`, and per filter `<f>/flats/`, `<f>/objects/`,
/// `<f>/objects/final/`.
#[derive(Clone, Debug, PartialEq)]
pub struct DirectoryLayout {
    root: PathBuf,
    filters: Vec<FilterId>,
}

impl DirectoryLayout {
    pub fn new(root: impl Into<PathBuf>, filters: Vec<FilterId>) -> Self {
        Self {
            root: root.into(),
            filters,
        }
    }

    pub fn for_catalog(root: impl Into<PathBuf>, catalog: &ObservationCatalog) -> Self {
        Self::new(root, catalog.filters())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn filters(&self) -> &[FilterId] {
        &self.filters
    }

    pub fn bias_dir(&self) -> PathBuf {
        self.root.join(BIAS_DIR)
    }

    pub fn dark_dir(&self) -> PathBuf {
        self.root.join(DARK_DIR)
    }

    pub fn flats_dir(&self, filter: &FilterId) -> PathBuf {
        self.root.join(filter.as_str()).join(FLATS_DIR)
    }

    pub fn objects_dir(&self, filter: &FilterId) -> PathBuf {
        self.root.join(filter.as_str()).join(OBJECTS_DIR)
    }

    pub fn final_dir(&self, filter: &FilterId) -> PathBuf {
        self.objects_dir(filter).join(FINAL_DIR)
    }

    pub fn preview_dir(&self) -> PathBuf {
        self.root.join(PREVIEW_DIR)
    }

    /// Directory a raw frame is copied into.
    pub fn dir_for(&self, record: &ObservationRecord) -> Result<PathBuf> {
        let filter = || {
            record.filter.as_ref().ok_or_else(|| {
                ReductionError::metadata(record.name.as_str(), "frame has no filter")
            })
        };
        Ok(match record.frame_type {
            FrameType::Bias => self.bias_dir(),
            FrameType::Dark => self.dark_dir(),
            FrameType::Flat => self.flats_dir(filter()?),
            FrameType::Object => self.objects_dir(filter()?),
        })
    }

    /// Create `bias/`, `dark/` and the per-filter flats/objects directories.
    pub fn create(&self) -> Result<()> {
        rfs::create_dir(&self.bias_dir())?;
        rfs::create_dir(&self.dark_dir())?;
        for filter in &self.filters {
            rfs::create_dir(&self.objects_dir(filter))?;
            rfs::create_dir(&self.flats_dir(filter))?;
        }
        Ok(())
    }
}

/// Result of a completed organize step.
#[derive(Clone, Debug)]
pub struct Organized {
    pub layout: DirectoryLayout,
    pub copied: usize,
}

impl Organized {
    pub fn filters(&self) -> &[FilterId] {
        self.layout.filters()
    }

    pub fn bias_dir(&self) -> PathBuf {
        self.layout.bias_dir()
    }

    pub fn dark_dir(&self) -> PathBuf {
        self.layout.dark_dir()
    }
}

/// Sort the raw frames of `catalog` into the directory layout.
///
/// Runs once per working directory: if the run marker is present nothing is
/// created or copied and [`ReductionError::AlreadyOrganized`] is returned.
/// The marker is written only after every frame was copied.
pub fn organize(catalog: &ObservationCatalog, working_dir: &Path) -> Result<Organized> {
    let marker = RunMarker::in_dir(working_dir);
    let ticket = marker.begin()?;

    let layout = DirectoryLayout::for_catalog(working_dir, catalog);
    layout.create()?;
    info!(
        filters = ?layout.filters().iter().map(FilterId::as_str).collect::<Vec<_>>(),
        "Directory layout created"
    );

    let mut copied = 0;
    for record in catalog.records() {
        let src = raw_frame_path(working_dir, &record.name)?;
        let dest = layout
            .dir_for(record)?
            .join(format!("{}.{FITS_EXTENSION}", record.name));
        rfs::copy_file(&src, &dest)?;
        debug!(frame = %record.name, to = %dest.display(), "Frame placed");
        copied += 1;
    }

    ticket.commit()?;
    info!(frames = copied, "Raw frames organized");
    Ok(Organized { layout, copied })
}

/// Locate the raw file of frame `name` in `dir`, whatever its FITS extension.
pub fn raw_frame_path(dir: &Path, name: &str) -> Result<PathBuf> {
    RAW_FRAME_EXTENSIONS
        .iter()
        .flat_map(|ext| [ext.to_string(), ext.to_ascii_uppercase()])
        .map(|ext| dir.join(format!("{name}.{ext}")))
        .find(|path| path.is_file())
        .ok_or_else(|| ReductionError::metadata(name, "raw frame file not found"))
}
