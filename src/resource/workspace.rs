//! Installation directory steps

use anyhow::Result;
use chrono::{DateTime, Local};
use declarative::{ApplyContext, ApplyResult, Resource, ResourceState};
use std::cell::OnceCell;
use std::path::PathBuf;

use crate::workspace::{self, InstallationWorkspace};

/// Files a reinstall keeps from the previous workspace
const CARRIED_FILES: [&str; 1] = [".env"];

/// A fresh, empty workspace; any existing one is moved to a backup.
///
/// Never converged: every install starts from an empty directory.
pub struct FreshWorkspace<'a> {
    path: PathBuf,
    clock: fn() -> DateTime<Local>,
    prepared: &'a OnceCell<InstallationWorkspace>,
}

impl<'a> FreshWorkspace<'a> {
    pub fn new(
        path: impl Into<PathBuf>,
        clock: fn() -> DateTime<Local>,
        prepared: &'a OnceCell<InstallationWorkspace>,
    ) -> Self {
        Self {
            path: path.into(),
            clock,
            prepared,
        }
    }
}

impl Resource for FreshWorkspace<'_> {
    fn id(&self) -> String {
        "workspace".to_string()
    }

    fn description(&self) -> String {
        format!("Prepare workspace {}", self.path.display())
    }

    fn resource_type(&self) -> &'static str {
        "workspace"
    }

    fn current_state(&self, _ctx: &ApplyContext) -> Result<ResourceState> {
        if self.path.exists() {
            Ok(ResourceState::Present {
                details: Some("existing, will be backed up".to_string()),
            })
        } else {
            Ok(ResourceState::Absent)
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present {
            details: Some("fresh".to_string()),
        }
    }

    fn needs_apply(&self, _ctx: &ApplyContext) -> Result<bool> {
        Ok(true)
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let prepared = workspace::prepare(&self.path, (self.clock)())?;
        for file in CARRIED_FILES {
            workspace::carry_forward(&prepared, file)?;
        }

        let result = if prepared.existed {
            ApplyResult::Modified
        } else {
            ApplyResult::Created
        };
        let _ = self.prepared.set(prepared);
        Ok(result)
    }
}

/// Removal of the workspace tree
pub struct WorkspaceRemoval {
    path: PathBuf,
}

impl WorkspaceRemoval {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Resource for WorkspaceRemoval {
    fn id(&self) -> String {
        "workspace".to_string()
    }

    fn description(&self) -> String {
        format!("Remove workspace {}", self.path.display())
    }

    fn resource_type(&self) -> &'static str {
        "workspace"
    }

    fn current_state(&self, _ctx: &ApplyContext) -> Result<ResourceState> {
        Ok(if self.path.exists() {
            ResourceState::Present { details: None }
        } else {
            ResourceState::Absent
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Absent
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        Ok(if workspace::teardown(&self.path)? {
            ApplyResult::Removed
        } else {
            ApplyResult::NoChange
        })
    }
}
