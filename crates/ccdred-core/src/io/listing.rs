use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{ReductionError, Result};
use crate::io::fs as rfs;

/// Ephemeral file enumerating a batch of frame paths, one per line, for
/// hand-off to the image engine (the `@list` convention).
///
/// The file is removed by [`WorkingList::release`] or, on any other exit
/// path, when the value is dropped. A retained list (debug runs) is left on
/// disk for inspection.
#[derive(Debug)]
pub struct WorkingList {
    path: PathBuf,
    entries: Vec<PathBuf>,
    retain: bool,
    released: bool,
}

impl WorkingList {
    /// Write `entries` to `<dir>/<list_name>`.
    pub fn materialize<I, P>(dir: &Path, list_name: &str, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let entries: Vec<PathBuf> = entries.into_iter().map(Into::into).collect();
        if entries.is_empty() {
            return Err(ReductionError::EmptySequence);
        }
        let path = dir.join(list_name);
        let mut contents = String::new();
        for entry in &entries {
            contents.push_str(&entry.to_string_lossy());
            contents.push('\n');
        }
        rfs::write_text(&path, &contents)?;
        debug!(list = %path.display(), count = entries.len(), "Working list written");
        Ok(Self {
            path,
            entries,
            retain: false,
            released: false,
        })
    }

    /// Keep the file on disk after release (debug runs).
    pub fn retain(mut self, retain: bool) -> Self {
        self.retain = retain;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Delete the list file, reporting a failure to do so.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        if self.retain {
            debug!(list = %self.path.display(), "Working list retained");
            return Ok(());
        }
        rfs::remove_file(&self.path)
    }
}

impl Drop for WorkingList {
    fn drop(&mut self) {
        if self.released || self.retain {
            return;
        }
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(list = %self.path.display(), error = %e, "Failed to remove working list");
            }
        }
    }
}

/// Read the entries of a list file written by [`WorkingList::materialize`].
pub fn read_list_file(path: &Path) -> Result<Vec<PathBuf>> {
    let contents = fs::read_to_string(path).map_err(|source| ReductionError::Filesystem {
        op: "read list",
        path: path.to_path_buf(),
        source,
    })?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect())
}
