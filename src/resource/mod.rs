//! Provisioning steps
//!
//! Each step adapts one component to [`declarative::Resource`]: observe
//! first, mutate only when the host differs from what the step wants.

mod config;
mod firewall;
mod host;
mod migration;
mod packages;
mod python;
mod service;
mod source;
mod workspace;

pub use config::EnvFile;
pub use firewall::FirewallPorts;
pub use host::HostProbe;
pub use migration::{DatabaseBackup, SchemaMigration};
pub use packages::SystemPackages;
pub use python::PythonRuntime;
pub use service::{
    FileRemoval, ManagedFile, ServiceRunning, ServiceTeardown, Teardown, UnitEnabled, UnitFile,
};
pub use source::{SOURCE_MARKER, SourceRelease};
pub use workspace::{FreshWorkspace, WorkspaceRemoval};
