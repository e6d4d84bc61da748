//! Python runtime step

use anyhow::Result;
use declarative::{ApplyContext, ApplyResult, Resource, ResourceState};

use crate::paths::Layout;
use crate::provision;

/// Virtual environment plus application and limits libraries.
///
/// pip decides what is already satisfied, so this step always runs.
pub struct PythonRuntime<'a> {
    layout: &'a Layout,
}

impl<'a> PythonRuntime<'a> {
    pub fn new(layout: &'a Layout) -> Self {
        Self { layout }
    }
}

impl Resource for PythonRuntime<'_> {
    fn id(&self) -> String {
        "python".to_string()
    }

    fn description(&self) -> String {
        "Install Python dependencies".to_string()
    }

    fn resource_type(&self) -> &'static str {
        "python"
    }

    fn current_state(&self, _ctx: &ApplyContext) -> Result<ResourceState> {
        Ok(if provision::has_venv(&self.layout.venv) {
            ResourceState::Present {
                details: Some("venv".to_string()),
            }
        } else {
            ResourceState::Absent
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present {
            details: Some("venv with requirements".to_string()),
        }
    }

    fn needs_apply(&self, _ctx: &ApplyContext) -> Result<bool> {
        Ok(true)
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let existed = provision::has_venv(&self.layout.venv);
        provision::install_python(self.layout, ctx.runner)?;
        Ok(if existed {
            ApplyResult::Modified
        } else {
            ApplyResult::Created
        })
    }
}
