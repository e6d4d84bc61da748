//! Pipeline - an ordered step table

use crate::resource::{BoxedResource, Resource};
use crate::types::StepPolicy;

/// One row of the step table
pub struct Step<'a, S> {
    /// Stage label reported while this step runs
    pub stage: S,
    pub policy: StepPolicy,
    pub resource: BoxedResource<'a>,
}

/// An ordered list of steps, executed strictly in sequence
pub struct Pipeline<'a, S> {
    steps: Vec<Step<'a, S>>,
}

impl<'a, S> Pipeline<'a, S> {
    /// Create a new empty pipeline
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Append a step that stops the pipeline when it fails
    pub fn fatal(&mut self, stage: S, resource: impl Resource + 'a) -> &mut Self {
        self.push(stage, StepPolicy::Fatal, Box::new(resource))
    }

    /// Append a step whose failure is only reported
    pub fn best_effort(&mut self, stage: S, resource: impl Resource + 'a) -> &mut Self {
        self.push(stage, StepPolicy::BestEffort, Box::new(resource))
    }

    pub fn push(
        &mut self,
        stage: S,
        policy: StepPolicy,
        resource: BoxedResource<'a>,
    ) -> &mut Self {
        self.steps.push(Step {
            stage,
            policy,
            resource,
        });
        self
    }

    pub fn steps(&self) -> &[Step<'a, S>] {
        &self.steps
    }

    /// Total number of steps in the pipeline
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if pipeline is empty
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Resource ids in execution order
    pub fn ids(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.resource.id()).collect()
    }
}

impl<S> Default for Pipeline<'_, S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ApplyContext;
    use crate::types::{ApplyResult, ResourceState};

    struct Named(&'static str);

    impl Resource for Named {
        fn id(&self) -> String {
            self.0.to_string()
        }
        fn description(&self) -> String {
            self.0.to_string()
        }
        fn resource_type(&self) -> &'static str {
            "test"
        }
        fn current_state(&self, _ctx: &ApplyContext) -> anyhow::Result<ResourceState> {
            Ok(ResourceState::Absent)
        }
        fn desired_state(&self) -> ResourceState {
            ResourceState::Absent
        }
        fn apply(&self, _ctx: &mut ApplyContext) -> anyhow::Result<ApplyResult> {
            Ok(ApplyResult::NoChange)
        }
    }

    #[test]
    fn test_pipeline_keeps_declaration_order() {
        let mut pipeline = Pipeline::new();
        pipeline
            .fatal(1, Named("probe"))
            .best_effort(2, Named("firewall"))
            .fatal(3, Named("start"));

        assert_eq!(pipeline.len(), 3);
        assert_eq!(pipeline.ids(), vec!["probe", "firewall", "start"]);
        assert_eq!(pipeline.steps()[1].policy, StepPolicy::BestEffort);
        assert_eq!(pipeline.steps()[2].stage, 3);
    }
}
