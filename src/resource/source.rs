//! Application source step

use anyhow::Result;
use artifact::{Fetcher, ReleaseArtifact};
use declarative::{ApplyContext, ApplyResult, Resource, ResourceState};
use std::fs;
use std::path::{Path, PathBuf};

/// Marker recording which `repo@ref` the workspace was populated from
pub const SOURCE_MARKER: &str = ".panelctl-source";

/// Application source tarball unpacked into the workspace.
///
/// With `refresh` set the tarball is fetched even when the marker matches,
/// since a branch ref can move.
pub struct SourceRelease<'a> {
    fetcher: &'a Fetcher,
    repo: String,
    git_ref: String,
    workspace: PathBuf,
    staging: PathBuf,
    refresh: bool,
}

impl<'a> SourceRelease<'a> {
    pub fn new(
        fetcher: &'a Fetcher,
        repo: &str,
        git_ref: &str,
        workspace: &Path,
        staging: &Path,
    ) -> Self {
        Self {
            fetcher,
            repo: repo.to_string(),
            git_ref: git_ref.to_string(),
            workspace: workspace.to_path_buf(),
            staging: staging.to_path_buf(),
            refresh: false,
        }
    }

    pub fn refresh(mut self) -> Self {
        self.refresh = true;
        self
    }

    fn origin(&self) -> String {
        format!("{}@{}", self.repo, self.git_ref)
    }
}

impl Resource for SourceRelease<'_> {
    fn id(&self) -> String {
        "source".to_string()
    }

    fn description(&self) -> String {
        format!("Fetch {}", self.origin())
    }

    fn resource_type(&self) -> &'static str {
        "source"
    }

    fn current_state(&self, _ctx: &ApplyContext) -> Result<ResourceState> {
        Ok(match fs::read_to_string(self.workspace.join(SOURCE_MARKER)) {
            Ok(origin) => ResourceState::Present {
                details: Some(origin.trim().to_string()),
            },
            Err(_) => ResourceState::Absent,
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present {
            details: Some(self.origin()),
        }
    }

    fn needs_apply(&self, ctx: &ApplyContext) -> Result<bool> {
        Ok(self.refresh || self.current_state(ctx)? != self.desired_state())
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let existed = self.current_state(ctx)?.is_present();
        let artifact = ReleaseArtifact::source(&self.repo, &self.git_ref, &self.staging);
        let files = self.fetcher.install(&artifact, &self.workspace)?;
        fs::write(self.workspace.join(SOURCE_MARKER), format!("{}\n", self.origin()))?;
        log::info!("Unpacked {} files from {}", files, artifact.download_url);

        Ok(if existed {
            ApplyResult::Modified
        } else {
            ApplyResult::Created
        })
    }
}
