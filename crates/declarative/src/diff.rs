//! Diff computation for pipelines

use crate::context::ApplyContext;
use crate::planner::Pipeline;
use crate::resource::Resource;
use crate::types::{ResourceState, StepPolicy};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Observed vs desired state of one step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDiff {
    /// Unique identifier of the resource
    pub resource_id: String,
    /// Type of the resource
    pub resource_type: String,
    /// Human-readable description
    pub description: String,
    /// Current state
    pub current: ResourceState,
    /// Desired state
    pub desired: ResourceState,
    /// Whether the step would run
    pub pending: bool,
    pub policy: StepPolicy,
}

impl ResourceDiff {
    /// Observe a resource without applying it
    pub fn from_resource(
        resource: &dyn Resource,
        policy: StepPolicy,
        ctx: &ApplyContext,
    ) -> Result<Self> {
        Ok(Self {
            resource_id: resource.id(),
            resource_type: resource.resource_type().to_string(),
            description: resource.description(),
            current: resource.current_state(ctx)?,
            desired: resource.desired_state(),
            pending: resource.needs_apply(ctx)?,
            policy,
        })
    }

    /// Check if this diff represents an addition
    pub fn is_addition(&self) -> bool {
        matches!(
            (&self.current, &self.desired),
            (ResourceState::Absent, ResourceState::Present { .. })
        )
    }

    /// Check if this diff represents a removal
    pub fn is_removal(&self) -> bool {
        matches!(
            (&self.current, &self.desired),
            (ResourceState::Present { .. }, ResourceState::Absent)
        )
    }
}

/// Observe every step of a pipeline
///
/// Steps whose observation fails are reported with an `Unknown` current
/// state rather than aborting the whole plan.
pub fn compute_diffs<S>(pipeline: &Pipeline<'_, S>, ctx: &ApplyContext) -> Vec<ResourceDiff> {
    pipeline
        .steps()
        .iter()
        .map(|step| {
            ResourceDiff::from_resource(step.resource.as_ref(), step.policy, ctx).unwrap_or_else(
                |_| ResourceDiff {
                    resource_id: step.resource.id(),
                    resource_type: step.resource.resource_type().to_string(),
                    description: step.resource.description(),
                    current: ResourceState::Unknown,
                    desired: step.resource.desired_state(),
                    pending: true,
                    policy: step.policy,
                },
            )
        })
        .collect()
}

/// Diff summary statistics
#[derive(Debug, Clone, Default)]
pub struct DiffSummary {
    /// Number of resources to add
    pub additions: usize,
    /// Number of resources to remove
    pub removals: usize,
    /// Number of other steps that would run
    pub modifications: usize,
    /// Steps already converged
    pub unchanged: usize,
}

impl DiffSummary {
    /// Create a summary from a list of diffs
    pub fn from_diffs(diffs: &[ResourceDiff]) -> Self {
        let mut summary = Self::default();
        for diff in diffs {
            if !diff.pending {
                summary.unchanged += 1;
            } else if diff.is_addition() {
                summary.additions += 1;
            } else if diff.is_removal() {
                summary.removals += 1;
            } else {
                summary.modifications += 1;
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.removals + self.modifications
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRunner;
    use crate::types::ApplyResult;

    struct Fixed {
        current: ResourceState,
        always: bool,
    }

    impl Resource for Fixed {
        fn id(&self) -> String {
            "fixed".into()
        }
        fn description(&self) -> String {
            "Fixed".into()
        }
        fn resource_type(&self) -> &'static str {
            "test"
        }
        fn current_state(&self, _ctx: &ApplyContext) -> Result<ResourceState> {
            Ok(self.current.clone())
        }
        fn desired_state(&self) -> ResourceState {
            ResourceState::Present { details: None }
        }
        fn needs_apply(&self, ctx: &ApplyContext) -> Result<bool> {
            Ok(self.always || self.current_state(ctx)? != self.desired_state())
        }
        fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
            Ok(ApplyResult::Created)
        }
    }

    #[test]
    fn test_summary_from_pipeline() {
        let mut pipeline = Pipeline::new();
        pipeline
            .fatal(
                0u8,
                Fixed {
                    current: ResourceState::Absent,
                    always: false,
                },
            )
            .fatal(
                1,
                Fixed {
                    current: ResourceState::Present { details: None },
                    always: false,
                },
            )
            .fatal(
                2,
                Fixed {
                    current: ResourceState::Present { details: None },
                    always: true,
                },
            );

        let runner = MockRunner::new();
        let ctx = ApplyContext::new(true, false, &runner);
        let diffs = compute_diffs(&pipeline, &ctx);
        let summary = DiffSummary::from_diffs(&diffs);

        assert_eq!(diffs.len(), 3);
        assert_eq!(summary.additions, 1);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.modifications, 1);
        assert!(summary.has_changes());
    }
}
