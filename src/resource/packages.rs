//! System package step

use anyhow::Result;
use declarative::{ApplyContext, ApplyResult, Resource, ResourceState};
use std::cell::OnceCell;

use super::host;
use crate::probe::HostProfile;
use crate::provision;

/// Base OS packages for the detected package manager
pub struct SystemPackages<'a> {
    profile: &'a OnceCell<HostProfile>,
}

impl<'a> SystemPackages<'a> {
    pub fn new(profile: &'a OnceCell<HostProfile>) -> Self {
        Self { profile }
    }
}

impl Resource for SystemPackages<'_> {
    fn id(&self) -> String {
        "packages".to_string()
    }

    fn description(&self) -> String {
        "Install system packages".to_string()
    }

    fn resource_type(&self) -> &'static str {
        "packages"
    }

    fn current_state(&self, ctx: &ApplyContext) -> Result<ResourceState> {
        let manager = host::profile(self.profile)?.package_manager;
        let missing = provision::missing_packages(manager, ctx.runner)?;
        if missing.is_empty() {
            Ok(ResourceState::Present { details: None })
        } else {
            Ok(ResourceState::Modified {
                from: format!("missing {}", missing.join(" ")),
                to: "installed".to_string(),
            })
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let manager = host::profile(self.profile)?.package_manager;
        let installed = provision::install_packages(manager, ctx.runner)?;
        if installed.is_empty() {
            Ok(ApplyResult::NoChange)
        } else {
            log::info!("Installed {}", installed.join(", "));
            Ok(ApplyResult::Created)
        }
    }
}
