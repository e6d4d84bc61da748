//! Orchestrator stages

use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;

use declarative::StepFailure;

/// Where a run is. Each step is tagged with the stage it works towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Idle,
    Probing,
    Provisioning,
    WorkspaceReady,
    Fetched,
    Configured,
    Migrated,
    ServiceRegistered,
    Started,
    /// Update only: database copied aside
    Snapshotted,
    /// Uninstall only
    Stopped,
    /// Uninstall only
    Removed,
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Probing => "probing",
            Self::Provisioning => "provisioning",
            Self::WorkspaceReady => "workspace-ready",
            Self::Fetched => "fetched",
            Self::Configured => "configured",
            Self::Migrated => "migrated",
            Self::ServiceRegistered => "service-registered",
            Self::Started => "started",
            Self::Snapshotted => "snapshotted",
            Self::Stopped => "stopped",
            Self::Removed => "removed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A run stopped at `stage`. Nothing done before it is rolled back.
#[derive(Debug)]
pub struct StageFailure {
    pub stage: Stage,
    pub step: String,
    pub source: anyhow::Error,
}

impl StageFailure {
    pub fn new(stage: Stage, step: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self {
            stage,
            step: step.into(),
            source: source.into(),
        }
    }

    /// The underlying error, if it is an `E`
    pub fn cause<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.source.downcast_ref::<E>()
    }
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed at stage {}", self.step, self.stage)
    }
}

impl StdError for StageFailure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&*self.source)
    }
}

impl From<StepFailure<Stage>> for StageFailure {
    fn from(failure: StepFailure<Stage>) -> Self {
        Self {
            stage: failure.stage,
            step: failure.description,
            source: failure.error,
        }
    }
}
