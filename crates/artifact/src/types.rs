//! Core types for release artifacts.

use crate::platform::Arch;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A published release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Release tag (e.g., "v1.8.24").
    pub tag: String,
    /// Human-readable release name.
    pub name: String,
    /// Whether this is a prerelease.
    pub prerelease: bool,
    /// Publication date (ISO 8601).
    pub published_at: String,
    /// Downloadable assets.
    pub assets: Vec<ReleaseAsset>,
}

impl Release {
    /// Create a release with just a tag (useful for testing).
    #[must_use]
    pub fn tagged(tag: impl Into<String>) -> Self {
        let tag = tag.into();
        Self {
            name: tag.clone(),
            tag,
            prerelease: false,
            published_at: String::new(),
            assets: Vec::new(),
        }
    }
}

/// A downloadable asset from a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    /// Asset filename.
    pub name: String,
    /// Direct download URL.
    pub download_url: String,
    /// Size in bytes.
    pub size: u64,
}

/// How an archive is laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchiveFormat {
    /// Gzipped tarball; the first `strip_components` path segments are dropped.
    TarGz {
        /// Leading path components to drop from every entry.
        strip_components: usize,
    },
    /// Zip archive, extracted as-is.
    Zip,
}

/// A release archive to be downloaded and unpacked.
///
/// Transient: the local archive only exists between fetch and extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseArtifact {
    /// Tag or git ref being installed.
    pub version: String,
    /// Architecture the archive was built for; `None` for source archives.
    pub arch: Option<Arch>,
    /// Where the archive is downloaded from.
    pub download_url: String,
    /// Where the archive is staged before extraction.
    pub local_archive_path: PathBuf,
    /// Archive layout.
    pub format: ArchiveFormat,
}

impl ReleaseArtifact {
    /// The source tarball of `repo` at `git_ref`, staged in `staging_dir`.
    ///
    /// GitHub wraps the tree in a single `<repo>-<ref>/` directory, which is
    /// stripped on extraction.
    #[must_use]
    pub fn source(repo: &str, git_ref: &str, staging_dir: &Path) -> Self {
        let file_name = format!("{}-{}.tar.gz", repo_name(repo), sanitize(git_ref));
        Self {
            version: git_ref.to_string(),
            arch: None,
            download_url: source_archive_url(repo, git_ref),
            local_archive_path: staging_dir.join(file_name),
            format: ArchiveFormat::TarGz {
                strip_components: 1,
            },
        }
    }

    /// The core release asset of `repo` at `tag` for `arch`.
    #[must_use]
    pub fn core(repo: &str, tag: &str, arch: Arch, staging_dir: &Path) -> Self {
        let asset = arch.core_asset_name();
        Self {
            version: tag.to_string(),
            arch: Some(arch),
            download_url: release_asset_url(repo, tag, &asset),
            local_archive_path: staging_dir.join(asset),
            format: ArchiveFormat::Zip,
        }
    }
}

/// Source archive URL for a branch, tag or commit.
#[must_use]
pub fn source_archive_url(repo: &str, git_ref: &str) -> String {
    format!("https://github.com/{repo}/archive/{git_ref}.tar.gz")
}

/// Download URL for a named asset attached to a release.
#[must_use]
pub fn release_asset_url(repo: &str, tag: &str, asset: &str) -> String {
    format!("https://github.com/{repo}/releases/download/{tag}/{asset}")
}

fn repo_name(repo: &str) -> &str {
    repo.rsplit('/').next().unwrap_or(repo)
}

fn sanitize(git_ref: &str) -> String {
    git_ref
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '-' })
        .collect()
}
