//! File system utility functions.
//!
//! Provides simple wrappers around std::fs for common file operations.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{io_error, CharencError, Result};

/// Check if a file exists at the given path.
pub fn file_exists(path: &Path) -> bool {
    path.exists() && path.is_file()
}

/// Resolve a user-supplied path to an absolute one, failing if it does not exist.
pub fn resolve_existing(path: &Path) -> Result<PathBuf> {
    if !file_exists(path) {
        return Err(CharencError::FileNotFound(path.to_path_buf()));
    }
    fs::canonicalize(path).map_err(io_error("Cannot resolve path", path))
}

/// Get the filename from a path.
pub fn get_file_name(path: &Path) -> Option<String> {
    path.file_name().map(|s| s.to_string_lossy().into_owned())
}

/// Get the parent directory from a path, `.` for bare file names.
pub fn get_directory(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Replace `path` with `data` via a temp file in the same directory.
///
/// An existing file keeps its permissions.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = get_directory(path);
    let mut tmp = NamedTempFile::new_in(&dir).map_err(io_error("Cannot write file", path))?;
    tmp.write_all(data)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(io_error("Cannot write file", path))?;

    if let Ok(existing) = fs::metadata(path) {
        fs::set_permissions(tmp.path(), existing.permissions())
            .map_err(io_error("Cannot write file", path))?;
    }

    tmp.persist(path)
        .map_err(|e| io_error("Cannot write file", path)(e.error))?;
    Ok(())
}

/// Remove a file, reporting whether it existed.
pub fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Remove a directory only when it is empty.
pub fn remove_dir_if_empty(path: &Path) -> bool {
    fs::remove_dir(path).is_ok()
}
