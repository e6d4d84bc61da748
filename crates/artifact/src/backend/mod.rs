//! Backend traits and implementations for release metadata and downloads.
//!
//! This module provides the [`Backend`] trait and implementations for
//! different release sources. The primary implementation is
//! [`github::GitHubBackend`].
//!
//! # Testing
//!
//! Use [`MockBackend`] for testing without network access:
//!
//! ```
//! use artifact::backend::{Backend, MockBackend};
//! use artifact::Release;
//!
//! let mut mock = MockBackend::new();
//! mock.add_release("XTLS/Xray-core", Release::tagged("v1.8.24"));
//!
//! let latest = mock.latest_release("XTLS/Xray-core").unwrap();
//! assert_eq!(latest.unwrap().tag, "v1.8.24");
//! ```

pub mod github;

use crate::error::{Error, Result};
use crate::types::Release;
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Backend trait for release metadata and downloads.
///
/// This abstraction allows for different sources of releases
/// (GitHub, mirrors, in-memory fixtures) and enables testing.
pub trait Backend {
    /// Fetch the latest published release of a repository.
    ///
    /// Returns `Ok(None)` when the repository has no releases.
    fn latest_release(&self, repo: &str) -> Result<Option<Release>>;

    /// Stream the body at `url` into `sink`.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns `Error::Http` if the URL cannot be downloaded.
    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<u64>;
}

/// Mock backend for testing without network access.
///
/// This backend stores releases and assets in memory. Clones share state,
/// so a test can keep one handle to inspect downloads after handing another
/// to a [`crate::Fetcher`].
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    releases: Arc<Mutex<HashMap<String, Vec<Release>>>>,
    assets: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    downloads: Arc<Mutex<Vec<String>>>,
}

impl MockBackend {
    /// Create a new empty mock backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a release for a repository. The most recently added is the latest.
    pub fn add_release(&mut self, repo: &str, release: Release) {
        let mut releases = self.releases.lock().unwrap();
        releases.entry(repo.to_string()).or_default().push(release);
    }

    /// Serve `data` for downloads of `url`.
    pub fn add_asset(&mut self, url: impl Into<String>, data: Vec<u8>) {
        let mut assets = self.assets.lock().unwrap();
        assets.insert(url.into(), data);
    }

    /// URLs downloaded so far, in order.
    #[must_use]
    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }
}

impl Backend for MockBackend {
    fn latest_release(&self, repo: &str) -> Result<Option<Release>> {
        let releases = self.releases.lock().unwrap();
        Ok(releases.get(repo).and_then(|r| r.last()).cloned())
    }

    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<u64> {
        self.downloads.lock().unwrap().push(url.to_string());

        let assets = self.assets.lock().unwrap();
        let data = assets.get(url).ok_or_else(|| Error::http("HTTP 404", Some(404)))?;
        sink.write_all(data)
            .map_err(|e| Error::http(e.to_string(), None))?;
        Ok(data.len() as u64)
    }
}
