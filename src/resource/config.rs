//! Environment file step

use anyhow::Result;
use declarative::{ApplyContext, ApplyResult, Resource, ResourceState};

use crate::config::{self, ConfigOutcome, ConfigurationRecord};
use crate::paths::Layout;
use crate::settings::Settings;

/// The env file with generated secrets, written only when absent
pub struct EnvFile<'a> {
    layout: &'a Layout,
    settings: &'a Settings,
}

impl<'a> EnvFile<'a> {
    pub fn new(layout: &'a Layout, settings: &'a Settings) -> Self {
        Self { layout, settings }
    }
}

impl Resource for EnvFile<'_> {
    fn id(&self) -> String {
        "config".to_string()
    }

    fn description(&self) -> String {
        format!("Generate {}", self.layout.env_file.display())
    }

    fn resource_type(&self) -> &'static str {
        "config"
    }

    fn current_state(&self, _ctx: &ApplyContext) -> Result<ResourceState> {
        Ok(if self.layout.env_file.is_file() {
            ResourceState::Present { details: None }
        } else {
            ResourceState::Absent
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let outcome = config::ensure_config(&self.layout.env_file, || {
            ConfigurationRecord::generate(self.settings, self.layout)
        })?;
        Ok(match outcome {
            ConfigOutcome::Created => ApplyResult::Created,
            ConfigOutcome::Preserved => ApplyResult::NoChange,
        })
    }
}
