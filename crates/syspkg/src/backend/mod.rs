//! Backend abstraction for package operations.
//!
//! The [`Backend`] trait defines the interface for querying and installing
//! system packages. [`cli::CliBackend`] drives the real package manager
//! through a [`declarative::Runner`], so tests substitute a scripted runner
//! rather than a separate mock backend.

pub mod cli;

use crate::error::Result;
use crate::types::PackageManager;

/// Backend trait for system package operations.
pub trait Backend {
    /// The package manager this backend drives.
    fn manager(&self) -> PackageManager;

    /// Check if a package is installed.
    fn is_installed(&self, package: &str) -> Result<bool>;

    /// Refresh package metadata (a no-op for managers that need none).
    fn refresh(&self) -> Result<()>;

    /// Install packages in a single transaction.
    fn install(&self, packages: &[String]) -> Result<()>;
}
