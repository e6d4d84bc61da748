//! Execution engine - walks a pipeline in order, one step at a time

use crate::context::{ApplyContext, ProgressCallback, Runner};
use crate::planner::{Pipeline, Step};
use crate::types::{ApplyResult, ExecuteOptions, ExecuteSummary, StepPolicy};
use anyhow::Result;
use std::error::Error as StdError;
use std::fmt;

/// A fatal step failed and the pipeline stopped
#[derive(Debug)]
pub struct StepFailure<S> {
    /// Stage of the step that failed
    pub stage: S,
    pub resource_id: String,
    pub description: String,
    pub error: anyhow::Error,
}

impl<S: fmt::Display> fmt::Display for StepFailure<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed during {}: {:#}",
            self.description, self.stage, self.error
        )
    }
}

impl<S: fmt::Debug + fmt::Display> StdError for StepFailure<S> {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&*self.error)
    }
}

/// Execute a pipeline with the given options and progress callback
///
/// Steps run strictly in declaration order. Each step is observed first;
/// a step that is already converged reports [`ApplyResult::NoChange`] and
/// is not applied. A failing [`StepPolicy::Fatal`] step stops the pipeline
/// and nothing after it runs. A failing [`StepPolicy::BestEffort`] step is
/// reported through [`ProgressCallback::on_step_warning`] and counted in
/// [`ExecuteSummary::warnings`].
///
/// With `opts.dry_run` every step is observed but none is applied.
pub fn execute<S, P>(
    pipeline: &Pipeline<'_, S>,
    opts: &ExecuteOptions,
    runner: &dyn Runner,
    progress: &mut P,
) -> Result<ExecuteSummary, StepFailure<S>>
where
    S: Copy,
    P: ProgressCallback<S>,
{
    let mut summary = ExecuteSummary::default();
    let total = pipeline.len();

    for (index, step) in pipeline.steps().iter().enumerate() {
        let id = step.resource.id();
        let description = step.resource.description();
        progress.on_step_start(index, total, step.stage, &description);

        match run_step(step, opts, runner) {
            Ok(result) => {
                summary.add_result(&result);
                progress.on_step_complete(&id, &result);
            }
            Err(error) => match step.policy {
                StepPolicy::BestEffort => {
                    summary.warnings += 1;
                    progress.on_step_warning(&id, &error);
                }
                StepPolicy::Fatal => {
                    progress.on_step_failed(step.stage, &id, &error);
                    return Err(StepFailure {
                        stage: step.stage,
                        resource_id: id,
                        description,
                        error,
                    });
                }
            },
        }
    }

    Ok(summary)
}

/// Observe and, if needed, apply a single step
fn run_step<S>(step: &Step<'_, S>, opts: &ExecuteOptions, runner: &dyn Runner) -> Result<ApplyResult> {
    let mut ctx = ApplyContext::new(opts.dry_run, opts.verbose, runner);

    if !step.resource.needs_apply(&ctx)? {
        return Ok(ApplyResult::NoChange);
    }

    if opts.dry_run {
        return Ok(ApplyResult::Skipped {
            reason: "dry run".into(),
        });
    }

    step.resource.apply(&mut ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NoProgress;
    use crate::mock::MockRunner;
    use crate::resource::Resource;
    use crate::types::ResourceState;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct TestResource {
        id: &'static str,
        converged: bool,
        fail: bool,
        log: Rc<RefCell<Vec<&'static str>>>,
    }

    impl TestResource {
        fn new(id: &'static str, log: &Rc<RefCell<Vec<&'static str>>>) -> Self {
            Self {
                id,
                converged: false,
                fail: false,
                log: Rc::clone(log),
            }
        }

        fn converged(mut self) -> Self {
            self.converged = true;
            self
        }

        fn failing(mut self) -> Self {
            self.fail = true;
            self
        }
    }

    impl Resource for TestResource {
        fn id(&self) -> String {
            self.id.to_string()
        }

        fn description(&self) -> String {
            format!("Test resource {}", self.id)
        }

        fn resource_type(&self) -> &'static str {
            "test"
        }

        fn current_state(&self, _ctx: &ApplyContext) -> Result<ResourceState> {
            if self.converged {
                Ok(ResourceState::Present { details: None })
            } else {
                Ok(ResourceState::Absent)
            }
        }

        fn desired_state(&self) -> ResourceState {
            ResourceState::Present { details: None }
        }

        fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
            self.log.borrow_mut().push(self.id);
            if self.fail {
                anyhow::bail!("{} exploded", self.id);
            }
            Ok(ApplyResult::Created)
        }
    }

    #[derive(Default)]
    struct Recorder {
        stages: Vec<u8>,
        warnings: Vec<String>,
        failed: Option<(u8, String)>,
    }

    impl ProgressCallback<u8> for Recorder {
        fn on_step_start(&mut self, _index: usize, _total: usize, stage: u8, _description: &str) {
            self.stages.push(stage);
        }
        fn on_step_complete(&mut self, _id: &str, _result: &ApplyResult) {}
        fn on_step_warning(&mut self, id: &str, _error: &anyhow::Error) {
            self.warnings.push(id.to_string());
        }
        fn on_step_failed(&mut self, stage: u8, id: &str, _error: &anyhow::Error) {
            self.failed = Some((stage, id.to_string()));
        }
    }

    #[test]
    fn test_execute_empty_pipeline() {
        let pipeline: Pipeline<'_, u8> = Pipeline::new();
        let runner = MockRunner::new();
        let summary =
            execute(&pipeline, &ExecuteOptions::default(), &runner, &mut NoProgress).unwrap();

        assert_eq!(summary.total(), 0);
    }

    #[test]
    fn test_converged_step_reports_no_change() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut pipeline = Pipeline::new();
        pipeline.fatal(0u8, TestResource::new("done", &log).converged());

        let runner = MockRunner::new();
        let summary =
            execute(&pipeline, &ExecuteOptions::default(), &runner, &mut NoProgress).unwrap();

        assert_eq!(summary.no_change, 1);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_fatal_failure_stops_pipeline() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut pipeline = Pipeline::new();
        pipeline
            .fatal(1u8, TestResource::new("first", &log))
            .fatal(2, TestResource::new("second", &log).failing())
            .fatal(3, TestResource::new("third", &log));

        let runner = MockRunner::new();
        let mut recorder = Recorder::default();
        let failure =
            execute(&pipeline, &ExecuteOptions::default(), &runner, &mut recorder).unwrap_err();

        assert_eq!(failure.stage, 2);
        assert_eq!(failure.resource_id, "second");
        assert_eq!(*log.borrow(), vec!["first", "second"]);
        assert_eq!(recorder.stages, vec![1, 2]);
        assert_eq!(recorder.failed, Some((2, "second".to_string())));
        assert!(failure.to_string().contains("second exploded"));
    }

    #[test]
    fn test_best_effort_failure_continues() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut pipeline = Pipeline::new();
        pipeline
            .best_effort(1u8, TestResource::new("firewall", &log).failing())
            .fatal(2, TestResource::new("start", &log));

        let runner = MockRunner::new();
        let mut recorder = Recorder::default();
        let summary =
            execute(&pipeline, &ExecuteOptions::default(), &runner, &mut recorder).unwrap();

        assert_eq!(summary.warnings, 1);
        assert_eq!(summary.created, 1);
        assert_eq!(recorder.warnings, vec!["firewall"]);
        assert_eq!(*log.borrow(), vec!["firewall", "start"]);
    }

    #[test]
    fn test_dry_run_applies_nothing() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut pipeline = Pipeline::new();
        pipeline
            .fatal(1u8, TestResource::new("a", &log))
            .fatal(2, TestResource::new("b", &log).converged());

        let runner = MockRunner::new();
        let opts = ExecuteOptions {
            dry_run: true,
            verbose: false,
        };
        let summary = execute(&pipeline, &opts, &runner, &mut NoProgress).unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.no_change, 1);
        assert!(log.borrow().is_empty());
    }
}
