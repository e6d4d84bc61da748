//! Host detection step

use anyhow::Result;
use declarative::{ApplyContext, ApplyResult, Resource, ResourceState};
use std::cell::OnceCell;
use std::path::PathBuf;

use crate::probe::{self, HostProfile};

/// Detect OS family, package manager and architecture.
///
/// Read-only: the probe runs during observation and the result is cached
/// for the steps that follow, so it always reports no change.
pub struct HostProbe<'a> {
    root: PathBuf,
    profile: &'a OnceCell<HostProfile>,
}

impl<'a> HostProbe<'a> {
    pub fn new(root: impl Into<PathBuf>, profile: &'a OnceCell<HostProfile>) -> Self {
        Self {
            root: root.into(),
            profile,
        }
    }
}

impl Resource for HostProbe<'_> {
    fn id(&self) -> String {
        "host".to_string()
    }

    fn description(&self) -> String {
        "Detect host".to_string()
    }

    fn resource_type(&self) -> &'static str {
        "probe"
    }

    fn current_state(&self, ctx: &ApplyContext) -> Result<ResourceState> {
        let profile = match self.profile.get() {
            Some(profile) => *profile,
            None => {
                let profile = probe::probe(ctx.runner, &self.root)?;
                *self.profile.get_or_init(|| profile)
            }
        };
        Ok(ResourceState::Present {
            details: Some(profile.to_string()),
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present {
            details: self.profile.get().map(ToString::to_string),
        }
    }

    fn needs_apply(&self, ctx: &ApplyContext) -> Result<bool> {
        self.current_state(ctx)?;
        Ok(false)
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        Ok(ApplyResult::NoChange)
    }
}

/// The cached profile, for steps that run after [`HostProbe`]
pub fn profile(cell: &OnceCell<HostProfile>) -> Result<HostProfile> {
    cell.get()
        .copied()
        .ok_or_else(|| anyhow::anyhow!("host has not been probed"))
}
