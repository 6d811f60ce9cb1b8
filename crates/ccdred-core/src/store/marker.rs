use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::consts::{RUN_MARKER_FILE, RUN_MARKER_TEXT};
use crate::error::{ReductionError, Result};
use crate::io::fs as rfs;

/// Persisted state of a working directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkerState {
    /// Never organized, or an earlier organize did not finish.
    Absent,
    Present,
}

/// The sentinel file recording that a working directory was organized.
///
/// Lifecycle: `Absent` → organizing (an [`OrganizeTicket`] is held) →
/// `Present` once the ticket is committed. Dropping the ticket without
/// committing leaves the marker absent.
#[derive(Clone, Debug)]
pub struct RunMarker {
    path: PathBuf,
}

impl RunMarker {
    pub fn in_dir(working_dir: &Path) -> Self {
        Self {
            path: working_dir.join(RUN_MARKER_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> MarkerState {
        if self.path.exists() {
            MarkerState::Present
        } else {
            MarkerState::Absent
        }
    }

    /// Start organizing. Fails if the directory was already organized.
    pub fn begin(&self) -> Result<OrganizeTicket<'_>> {
        match self.state() {
            MarkerState::Present => {
                let dir = self
                    .path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_default();
                Err(ReductionError::AlreadyOrganized(dir))
            }
            MarkerState::Absent => {
                debug!(marker = %self.path.display(), "Organizing");
                Ok(OrganizeTicket { marker: self })
            }
        }
    }
}

/// Proof that organization is in progress.
#[must_use = "the run marker is only written by commit()"]
#[derive(Debug)]
pub struct OrganizeTicket<'a> {
    marker: &'a RunMarker,
}

impl OrganizeTicket<'_> {
    /// Write the marker. Must be the last step of organizing.
    pub fn commit(self) -> Result<()> {
        rfs::write_text(&self.marker.path, &format!("{RUN_MARKER_TEXT}\n"))?;
        info!(marker = %self.marker.path.display(), "Run marker written");
        Ok(())
    }
}
