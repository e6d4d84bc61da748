//! Resource trait for declarative state management
//!
//! A Resource represents something on the host that can be in a certain
//! state, and can be changed to reach a desired state.

use crate::context::ApplyContext;
use crate::types::{ApplyResult, ResourceState};
use anyhow::Result;

/// Core trait for provisioning steps
///
/// Every step in a pipeline implements this trait, which provides:
/// - Identity (id, description, type)
/// - State detection (current vs desired)
/// - State convergence (apply)
///
/// Observation receives the same [`ApplyContext`] as `apply`, so probing
/// commands (`dpkg -s`, `systemctl is-active`) go through the runner too.
///
/// # Example
///
/// ```ignore
/// use declarative::{ApplyContext, ApplyResult, Resource, ResourceState};
///
/// struct DataDir { path: std::path::PathBuf }
///
/// impl Resource for DataDir {
///     fn id(&self) -> String { self.path.display().to_string() }
///     fn description(&self) -> String { format!("Create {}", self.path.display()) }
///     fn resource_type(&self) -> &'static str { "directory" }
///
///     fn current_state(&self, _ctx: &ApplyContext) -> anyhow::Result<ResourceState> {
///         Ok(if self.path.is_dir() {
///             ResourceState::Present { details: None }
///         } else {
///             ResourceState::Absent
///         })
///     }
///
///     fn desired_state(&self) -> ResourceState {
///         ResourceState::Present { details: None }
///     }
///
///     fn apply(&self, _ctx: &mut ApplyContext) -> anyhow::Result<ApplyResult> {
///         std::fs::create_dir_all(&self.path)?;
///         Ok(ApplyResult::Created)
///     }
/// }
/// ```
pub trait Resource {
    /// Unique identifier for this resource
    ///
    /// Examples: "packages", "/opt/panel/.env", "panel.service"
    fn id(&self) -> String;

    /// Human-readable description of what this resource does
    fn description(&self) -> String;

    /// Resource type category, used for grouping in plans
    fn resource_type(&self) -> &'static str;

    /// Detect the current state of this resource
    ///
    /// Must not mutate the host.
    fn current_state(&self, ctx: &ApplyContext) -> Result<ResourceState>;

    /// Get the desired state for this resource
    fn desired_state(&self) -> ResourceState;

    /// Check if the resource needs changes to reach desired state
    ///
    /// Default implementation compares current and desired states.
    /// Steps that must run every time (fetching a fresh release, running
    /// migrations) override this to return `true`.
    fn needs_apply(&self, ctx: &ApplyContext) -> Result<bool> {
        let current = self.current_state(ctx)?;
        Ok(current != self.desired_state())
    }

    /// Apply changes to reach the desired state
    ///
    /// Only called when [`Resource::needs_apply`] returned `true` and the
    /// run is not a dry run.
    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult>;
}

/// A boxed resource for type-erased storage
pub type BoxedResource<'a> = Box<dyn Resource + 'a>;
