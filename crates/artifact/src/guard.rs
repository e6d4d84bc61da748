//! Scoped cleanup for downloaded archives.

use std::fs;
use std::path::{Path, PathBuf};

/// Deletes the archive at `path` when dropped.
///
/// Created before the download starts, so a partial download, a failed
/// extraction and a successful one all leave no archive behind.
#[derive(Debug)]
pub struct ArchiveGuard {
    path: PathBuf,
}

impl ArchiveGuard {
    /// Guard the file at `path`. The file does not need to exist yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path being guarded.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ArchiveGuard {
    fn drop(&mut self) {
        if self.path.exists() {
            // Nothing useful to do with a failure while unwinding
            let _ = fs::remove_file(&self.path);
        }
    }
}
