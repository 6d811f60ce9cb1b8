//! Every filesystem mutation the reduction performs goes through these
//! helpers, so a failed copy or move surfaces as an error with the path
//! attached instead of being silently ignored.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ReductionError, Result};

fn wrap(op: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> ReductionError {
    let path = path.to_path_buf();
    move |source| ReductionError::Filesystem { op, path, source }
}

/// Create a directory (and parents). Existing directories are fine.
pub fn create_dir(path: &Path) -> Result<()> {
    debug!(path = %path.display(), "mkdir");
    fs::create_dir_all(path).map_err(wrap("create directory", path))
}

/// Copy `src` to `dest`. Overwrites a previous copy, so repeating an
/// interrupted organize is harmless.
pub fn copy_file(src: &Path, dest: &Path) -> Result<()> {
    debug!(from = %src.display(), to = %dest.display(), "cp");
    fs::copy(src, dest).map_err(wrap("copy", src))?;
    Ok(())
}

/// Move `src` into `dest_dir`, keeping its file name.
pub fn move_into(src: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let file_name = src.file_name().ok_or_else(|| ReductionError::Filesystem {
        op: "move",
        path: src.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
    })?;
    let dest = dest_dir.join(file_name);
    debug!(from = %src.display(), to = %dest.display(), "mv");
    fs::rename(src, &dest).map_err(wrap("move", src))?;
    Ok(dest)
}

pub fn remove_file(path: &Path) -> Result<()> {
    debug!(path = %path.display(), "rm");
    fs::remove_file(path).map_err(wrap("remove", path))
}

pub fn write_text(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).map_err(wrap("write", path))
}

/// True when `path` is missing or contains no entries.
pub fn is_empty_dir(path: &Path) -> Result<bool> {
    if !path.is_dir() {
        return Ok(true);
    }
    let mut entries = fs::read_dir(path).map_err(wrap("read directory", path))?;
    Ok(entries.next().is_none())
}

/// Regular files directly inside `dir`, sorted by file name.
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(wrap("read directory", dir))? {
        let path = entry.map_err(wrap("read directory", dir))?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
