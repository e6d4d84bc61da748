//! Execution engine for panelctl
//!
//! The engine:
//! 1. Builds a step table for the requested operation
//! 2. Observes each step before applying it
//! 3. Tracks the deployment stage and stops at the first fatal failure

pub mod orchestrator;
pub mod report;
pub mod stage;

pub use orchestrator::{InstallOutcome, Orchestrator};
pub use report::Reporter;
pub use stage::{Stage, StageFailure};
