//! # artifact
//!
//! Release resolution, download and archive extraction for GitHub-hosted
//! components.
//!
//! This crate provides functionality for:
//! - Mapping the host's `uname -m` onto release asset names
//! - Resolving the latest release tag of a repository
//! - Downloading source tarballs and release assets
//! - Extracting tar.gz and zip archives without escaping the target
//!
//! ## Example
//!
//! ```no_run
//! use artifact::{Arch, Fetcher, ReleaseArtifact};
//! use std::path::Path;
//!
//! let fetcher = Fetcher::new();
//! let tag = fetcher.resolve_version("XTLS/Xray-core", None).unwrap();
//! let artifact = ReleaseArtifact::core("XTLS/Xray-core", &tag, Arch::X86_64, Path::new("/tmp"));
//! fetcher.install(&artifact, Path::new("/var/lib/panel/xray-core")).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod extract;
pub mod guard;
pub mod platform;
pub mod types;

pub use error::{Error, ErrorCategory, Result};
pub use guard::ArchiveGuard;
pub use platform::Arch;
pub use types::{
    ArchiveFormat, Release, ReleaseArtifact, ReleaseAsset, release_asset_url, source_archive_url,
};

use backend::Backend;
pub use backend::MockBackend;
use backend::github::GitHubBackend;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// High-level client for artifact operations.
pub struct Fetcher {
    backend: Box<dyn Backend>,
}

impl Fetcher {
    /// Create a new Fetcher with the default GitHub backend.
    #[must_use]
    pub fn new() -> Self {
        Self {
            backend: Box::new(GitHubBackend::new()),
        }
    }

    /// Create a fetcher with a custom backend (useful for testing).
    #[must_use]
    pub fn with_backend(backend: Box<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Pick the version to install.
    ///
    /// An explicit, non-blank request is used as-is. Otherwise the latest
    /// release tag of `repo` is resolved.
    ///
    /// # Errors
    ///
    /// Returns `Error::VersionResolution` when the repository has no usable
    /// latest release.
    pub fn resolve_version(&self, repo: &str, requested: Option<&str>) -> Result<String> {
        if let Some(version) = requested.map(str::trim).filter(|v| !v.is_empty()) {
            return Ok(version.to_string());
        }

        self.backend
            .latest_release(repo)?
            .map(|release| release.tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .ok_or_else(|| Error::VersionResolution {
                repo: repo.to_string(),
            })
    }

    /// Download `url` to `destination`.
    ///
    /// A failed or empty transfer removes whatever was written and returns
    /// `Error::Fetch`.
    pub fn fetch(&self, url: &str, destination: &Path) -> Result<u64> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let result = self.download_to(url, destination);
        match result {
            Ok(0) => {
                let _ = fs::remove_file(destination);
                Err(Error::Fetch {
                    url: url.to_string(),
                    message: "empty response".to_string(),
                    status: None,
                })
            }
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                let _ = fs::remove_file(destination);
                Err(Error::Fetch {
                    url: url.to_string(),
                    status: e.status(),
                    message: e.to_string(),
                })
            }
        }
    }

    fn download_to(&self, url: &str, destination: &Path) -> Result<u64> {
        let file = File::create(destination).map_err(|e| Error::io(destination, e))?;
        let mut writer = BufWriter::new(file);
        let bytes = self.backend.download(url, &mut writer)?;
        writer.flush().map_err(|e| Error::io(destination, e))?;
        Ok(bytes)
    }

    /// Unpack an archive already on disk.
    pub fn extract(&self, archive: &Path, target: &Path, format: ArchiveFormat) -> Result<usize> {
        extract::extract(archive, target, format)
    }

    /// Download and unpack `artifact` into `target`.
    ///
    /// The staged archive is deleted on every path, including failures.
    /// Returns the number of files extracted.
    pub fn install(&self, artifact: &ReleaseArtifact, target: &Path) -> Result<usize> {
        let guard = ArchiveGuard::new(&artifact.local_archive_path);
        self.fetch(&artifact.download_url, guard.path())?;
        self.extract(guard.path(), target, artifact.format)
    }
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}
