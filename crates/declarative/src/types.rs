//! Core types for declarative provisioning steps

use serde::{Deserialize, Serialize};
use std::process::Output;

/// Current or desired state of a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceState {
    /// Resource exists/is configured
    Present { details: Option<String> },
    /// Resource does not exist/is not configured
    Absent,
    /// Resource exists but differs from desired
    Modified { from: String, to: String },
    /// State cannot be determined
    Unknown,
}

impl ResourceState {
    /// Check if state represents presence
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present { .. })
    }

    /// Check if state represents absence
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Short label used when printing plans
    pub fn label(&self) -> String {
        match self {
            Self::Present { details: Some(d) } => format!("present ({d})"),
            Self::Present { details: None } => "present".to_string(),
            Self::Absent => "absent".to_string(),
            Self::Modified { from, to } => format!("{from} -> {to}"),
            Self::Unknown => "unknown".to_string(),
        }
    }
}

/// Result of applying a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyResult {
    /// Already converged, nothing was touched
    NoChange,
    /// Resource was created
    Created,
    /// Resource was modified
    Modified,
    /// Resource was removed
    Removed,
    /// Apply was skipped
    Skipped { reason: String },
}

impl ApplyResult {
    /// Check if the result represents a change
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Created | Self::Modified | Self::Removed)
    }
}

/// Summary of execution results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub created: usize,
    pub modified: usize,
    pub removed: usize,
    pub skipped: usize,
    pub no_change: usize,
    /// Best-effort steps that failed and were carried past
    pub warnings: usize,
}

impl ExecuteSummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.modified + self.removed
    }

    /// Total number of steps processed
    pub fn total(&self) -> usize {
        self.created + self.modified + self.removed + self.skipped + self.no_change + self.warnings
    }

    /// Add a result to the summary
    pub fn add_result(&mut self, result: &ApplyResult) {
        match result {
            ApplyResult::NoChange => self.no_change += 1,
            ApplyResult::Created => self.created += 1,
            ApplyResult::Modified => self.modified += 1,
            ApplyResult::Removed => self.removed += 1,
            ApplyResult::Skipped { .. } => self.skipped += 1,
        }
    }
}

/// Options for execution
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Verbose output
    pub verbose: bool,
}

/// What the executor does when a step fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepPolicy {
    /// Stop the pipeline and report the failure
    Fatal,
    /// Log a warning and continue with the next step
    BestEffort,
}

/// Output from an external command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub success: bool,
    /// The command was killed after exceeding its time bound
    pub timed_out: bool,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: output.stdout,
            stderr: output.stderr,
            success: output.status.success(),
            timed_out: false,
        }
    }
}

impl CommandOutput {
    /// A successful run with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into().into_bytes(),
            success: true,
            ..Self::default()
        }
    }

    /// A failed run with the given stderr
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            stderr: stderr.into().into_bytes(),
            ..Self::default()
        }
    }

    /// A run that was killed for exceeding its timeout
    pub fn timeout() -> Self {
        Self {
            timed_out: true,
            ..Self::default()
        }
    }

    /// Get stdout as a string
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Get stderr as a string
    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }
}
