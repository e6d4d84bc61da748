//! Apply context and provider traits
//!
//! Resources never spawn processes themselves. Every external command goes
//! through a [`Runner`], which lets the whole pipeline run against a scripted
//! fake in tests.

use crate::types::{ApplyResult, CommandOutput};
use anyhow::Result;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// A single external command, described but not yet run
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Extra environment variables, on top of the inherited environment
    pub env: Vec<(String, String)>,
    /// Kill the process after this long. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Inherit the terminal instead of capturing output
    pub interactive: bool,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn interactive(mut self) -> Self {
        self.interactive = true;
        self
    }

    /// Program and arguments joined by spaces
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// A command that ran but did not succeed
#[derive(Debug, thiserror::Error)]
#[error("`{command}` failed: {stderr}")]
pub struct CommandError {
    pub command: String,
    pub stderr: String,
}

/// Runs external commands on behalf of resources
///
/// Implement this trait to provide process execution. Errors are reserved
/// for commands that could not be started at all; a non-zero exit is
/// reported through [`CommandOutput::success`].
pub trait Runner {
    /// Run a command to completion
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput>;

    /// Run a command and return just success/failure
    fn run_status(&self, invocation: &Invocation) -> Result<bool> {
        Ok(self.run(invocation)?.success)
    }

    /// Run a command and fail unless it exits successfully
    fn run_checked(&self, invocation: &Invocation) -> Result<CommandOutput> {
        let output = self.run(invocation)?;
        if !output.success {
            let stderr = output.stderr_str().trim().to_string();
            return Err(CommandError {
                command: invocation.command_line(),
                stderr: if stderr.is_empty() {
                    "no error output".to_string()
                } else {
                    stderr
                },
            }
            .into());
        }
        Ok(output)
    }

    /// Run a command and capture trimmed stdout
    fn run_capture(&self, invocation: &Invocation) -> Result<String> {
        Ok(self.run_checked(invocation)?.stdout_str().trim().to_string())
    }
}

/// Progress callback for pipeline execution
///
/// `S` is the stage label attached to each step.
pub trait ProgressCallback<S> {
    /// Called before a step is observed and applied
    fn on_step_start(&mut self, index: usize, total: usize, stage: S, description: &str);

    /// Called when a step completes
    fn on_step_complete(&mut self, id: &str, result: &ApplyResult);

    /// Called when a best-effort step fails and the pipeline carries on
    fn on_step_warning(&mut self, id: &str, error: &anyhow::Error);

    /// Called when a fatal step fails, right before the pipeline stops
    fn on_step_failed(&mut self, stage: S, id: &str, error: &anyhow::Error);
}

/// No-op progress callback
pub struct NoProgress;

impl<S> ProgressCallback<S> for NoProgress {
    fn on_step_start(&mut self, _index: usize, _total: usize, _stage: S, _description: &str) {}
    fn on_step_complete(&mut self, _id: &str, _result: &ApplyResult) {}
    fn on_step_warning(&mut self, _id: &str, _error: &anyhow::Error) {}
    fn on_step_failed(&mut self, _stage: S, _id: &str, _error: &anyhow::Error) {}
}

/// Context passed to resource observe and apply operations
pub struct ApplyContext<'a> {
    /// Whether this is a dry run (no actual changes)
    pub dry_run: bool,
    /// Whether to output verbose information
    pub verbose: bool,
    /// Process execution for everything the resource touches outside the filesystem
    pub runner: &'a dyn Runner,
}

impl<'a> ApplyContext<'a> {
    /// Create a new apply context
    pub fn new(dry_run: bool, verbose: bool, runner: &'a dyn Runner) -> Self {
        Self {
            dry_run,
            verbose,
            runner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRunner;

    #[test]
    fn test_invocation_command_line() {
        let inv = Invocation::new("systemctl")
            .args(["enable", "panel"])
            .current_dir("/opt");
        assert_eq!(inv.command_line(), "systemctl enable panel");
        assert_eq!(inv.to_string(), "systemctl enable panel");
        assert_eq!(inv.cwd, Some(PathBuf::from("/opt")));
    }

    #[test]
    fn test_run_checked_reports_stderr() {
        let runner = MockRunner::new();
        runner.respond("false", CommandOutput::failed("boom\n"));

        let err = runner.run_checked(&Invocation::new("false")).unwrap_err();
        let command_err = err.downcast_ref::<CommandError>().unwrap();
        assert_eq!(command_err.command, "false");
        assert_eq!(command_err.stderr, "boom");
    }

    #[test]
    fn test_run_capture_trims() {
        let runner = MockRunner::new();
        runner.respond("uname -m", CommandOutput::ok("x86_64\n"));

        let out = runner
            .run_capture(&Invocation::new("uname").arg("-m"))
            .unwrap();
        assert_eq!(out, "x86_64");
    }
}
