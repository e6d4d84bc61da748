//! # syspkg
//!
//! Linux distribution detection and system package installation.
//!
//! ## Features
//!
//! - **Distribution detection**: marker files under `/etc`, fixed priority
//! - **Package lists**: per package manager (apt, yum, dnf)
//! - **Idempotent installs**: installed state is observed first and only
//!   missing packages are passed to the package manager
//!
//! ## Example
//!
//! ```ignore
//! use syspkg::{Client, OsFamily};
//! use std::path::Path;
//!
//! let family = OsFamily::detect(Path::new("/"))?;
//! let client = Client::for_manager(family.package_manager(), &runner);
//! let installed = client.ensure(family.package_manager().base_packages())?;
//! ```

#![warn(missing_docs)]

pub mod audit;
pub mod backend;
pub mod distro;
pub mod error;
pub mod types;

pub use audit::AuditResult;
pub use distro::OsFamily;
pub use error::{Error, ErrorCategory, Result};
pub use types::PackageManager;

use backend::Backend;
use backend::cli::CliBackend;
use declarative::Runner;

/// High-level package client.
pub struct Client<'a> {
    backend: Box<dyn Backend + 'a>,
}

impl<'a> Client<'a> {
    /// Client driving the real package manager through `runner`.
    pub fn for_manager(manager: PackageManager, runner: &'a dyn Runner) -> Self {
        Self {
            backend: Box::new(CliBackend::new(manager, runner)),
        }
    }

    /// Create a client with a custom backend.
    pub fn with_backend(backend: Box<dyn Backend + 'a>) -> Self {
        Self { backend }
    }

    /// The package manager in use.
    pub fn manager(&self) -> PackageManager {
        self.backend.manager()
    }

    /// Compare `wanted` against installed packages.
    pub fn audit(&self, wanted: &[&str]) -> Result<AuditResult> {
        audit::audit(self.backend.as_ref(), wanted)
    }

    /// Install whatever in `wanted` is missing.
    ///
    /// Refreshes metadata once (apt only) before installing. Returns the
    /// packages that were installed; empty when nothing was missing, in
    /// which case the package manager is never invoked.
    pub fn ensure(&self, wanted: &[&str]) -> Result<Vec<String>> {
        let audit = self.audit(wanted)?;
        if audit.is_satisfied() {
            return Ok(Vec::new());
        }

        self.backend.refresh()?;
        self.backend.install(&audit.missing)?;
        Ok(audit.missing)
    }
}
