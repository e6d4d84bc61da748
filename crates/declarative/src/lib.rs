//! # Declarative
//!
//! Ordered, observe-then-converge provisioning steps.
//!
//! This crate provides the core abstractions for declaring a step table,
//! detecting each step's current state, and converging the host one step at
//! a time.
//!
//! ## Core Concepts
//!
//! - **Resource**: Something with state that can be managed (packages, files, services)
//! - **ResourceState**: The current or desired state of a resource
//! - **Pipeline**: An ordered step table; each step carries a stage label and a policy
//! - **Executor**: Applies steps in order, stopping on fatal failures and
//!   carrying on past best-effort ones
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{execute, ExecuteOptions, NoProgress, Pipeline};
//!
//! let mut pipeline = Pipeline::new();
//! pipeline
//!     .fatal("packages", packages)
//!     .best_effort("firewall", firewall)
//!     .fatal("start", start);
//!
//! let summary = execute(&pipeline, &ExecuteOptions::default(), &runner, &mut NoProgress)?;
//! ```
//!
//! ## Provider Traits
//!
//! - [`Runner`]: Runs external commands (real processes, or [`MockRunner`] in tests)
//! - [`ProgressCallback`]: Receives progress updates
//!
//! This allows the crate to be used without hard dependencies on
//! specific UI frameworks or process spawning.

pub mod context;
pub mod diff;
pub mod executor;
pub mod mock;
pub mod planner;
pub mod resource;
pub mod types;

// Re-export main types at crate root
pub use context::{
    ApplyContext, CommandError, Invocation, NoProgress, ProgressCallback, Runner,
};
pub use diff::{compute_diffs, DiffSummary, ResourceDiff};
pub use executor::{execute, StepFailure};
pub use mock::MockRunner;
pub use planner::{Pipeline, Step};
pub use resource::{BoxedResource, Resource};
pub use types::{
    ApplyResult, CommandOutput, ExecuteOptions, ExecuteSummary, ResourceState, StepPolicy,
};
