//! GitHub releases backend.
//!
//! This module provides the [`GitHubBackend`] implementation for resolving
//! releases through GitHub's Releases API and downloading archives.
//!
//! # Rate Limiting
//!
//! The GitHub API has rate limits. For unauthenticated requests, the limit
//! is 60 requests per hour, which is plenty for a single install.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::{Release, ReleaseAsset};
use serde::Deserialize;
use std::io::{self, Write};

/// Maximum download size (source tarballs and core zips are well below this).
const MAX_BODY_SIZE: u64 = 200 * 1024 * 1024;

const USER_AGENT: &str = concat!("panelctl/", env!("CARGO_PKG_VERSION"));

/// GitHub releases backend.
pub struct GitHubBackend {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// GitHub API base URL.
    api_base: String,
}

impl GitHubBackend {
    /// Create a new GitHub backend.
    #[must_use]
    pub fn new() -> Self {
        Self::with_api_base("https://api.github.com")
    }

    /// Create a backend with a custom API base (for mirrors and testing).
    #[must_use]
    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            api_base: api_base.into(),
        }
    }

    /// Get the current API base URL.
    #[must_use]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Build the API URL for the latest release.
    fn latest_url(&self, repo: &str) -> String {
        format!("{}/repos/{}/releases/latest", self.api_base, repo)
    }
}

impl Default for GitHubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for GitHubBackend {
    fn latest_release(&self, repo: &str) -> Result<Option<Release>> {
        let url = self.latest_url(repo);

        let response = self
            .agent
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT)
            .call();

        match response {
            Ok(mut response) => {
                let release: GitHubRelease = response.body_mut().read_json()?;
                Ok(Some(release.into()))
            }
            // A repository without releases answers 404 here
            Err(ureq::Error::StatusCode(404)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<u64> {
        let mut response = self
            .agent
            .get(url)
            .header("Accept", "application/octet-stream")
            .header("User-Agent", USER_AGENT)
            .call()?;

        let mut reader = response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_SIZE)
            .reader();

        io::copy(&mut reader, sink).map_err(|e| Error::http(e.to_string(), None))
    }
}

// =============================================================================
// GitHub API response types
// =============================================================================

#[derive(Debug, Deserialize)]
struct GitHubRelease {
    tag_name: String,
    name: Option<String>,
    prerelease: bool,
    published_at: Option<String>,
    #[serde(default)]
    assets: Vec<GitHubAsset>,
}

#[derive(Debug, Deserialize)]
struct GitHubAsset {
    name: String,
    browser_download_url: String,
    size: u64,
}

impl From<GitHubRelease> for Release {
    fn from(r: GitHubRelease) -> Self {
        Self {
            tag: r.tag_name.clone(),
            name: r.name.filter(|n| !n.is_empty()).unwrap_or(r.tag_name),
            prerelease: r.prerelease,
            published_at: r.published_at.unwrap_or_default(),
            assets: r.assets.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<GitHubAsset> for ReleaseAsset {
    fn from(a: GitHubAsset) -> Self {
        Self {
            name: a.name,
            download_url: a.browser_download_url,
            size: a.size,
        }
    }
}
