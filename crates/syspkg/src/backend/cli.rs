//! Package manager CLI backend.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::PackageManager;
use declarative::Runner;

/// Drives `dpkg`/`rpm` and `apt-get`/`yum`/`dnf` through a runner.
pub struct CliBackend<'a> {
    manager: PackageManager,
    runner: &'a dyn Runner,
}

impl<'a> CliBackend<'a> {
    /// Create a backend for `manager`.
    pub fn new(manager: PackageManager, runner: &'a dyn Runner) -> Self {
        Self { manager, runner }
    }
}

impl Backend for CliBackend<'_> {
    fn manager(&self) -> PackageManager {
        self.manager
    }

    fn is_installed(&self, package: &str) -> Result<bool> {
        self.runner
            .run_status(&self.manager.query(package))
            .map_err(|e| Error::Query {
                package: package.to_string(),
                message: format!("{e:#}"),
            })
    }

    fn refresh(&self) -> Result<()> {
        let Some(invocation) = self.manager.refresh() else {
            return Ok(());
        };

        let output = self
            .runner
            .run(&invocation)
            .map_err(|e| Error::RefreshFailed {
                message: format!("{e:#}"),
            })?;

        if !output.success {
            return Err(Error::RefreshFailed {
                message: output.stderr_str().trim().to_string(),
            });
        }
        Ok(())
    }

    fn install(&self, packages: &[String]) -> Result<()> {
        if packages.is_empty() {
            return Ok(());
        }

        let output = self
            .runner
            .run(&self.manager.install(packages))
            .map_err(|e| Error::InstallFailed {
                packages: packages.to_vec(),
                message: format!("{e:#}"),
            })?;

        if !output.success {
            return Err(Error::InstallFailed {
                packages: packages.to_vec(),
                message: output.stderr_str().trim().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::MockRunner;

    #[test]
    fn test_is_installed_follows_exit_status() {
        let runner = MockRunner::new();
        runner.fail("dpkg -s unzip", "package 'unzip' is not installed");
        let backend = CliBackend::new(PackageManager::Apt, &runner);

        assert!(backend.is_installed("curl").unwrap());
        assert!(!backend.is_installed("unzip").unwrap());
    }

    #[test]
    fn test_install_failure_carries_stderr() {
        let runner = MockRunner::new();
        runner.fail("yum install", "No package python3-devel available.");
        let backend = CliBackend::new(PackageManager::Yum, &runner);

        let err = backend
            .install(&["python3-devel".to_string()])
            .unwrap_err();
        assert!(err.to_string().contains("python3-devel"));
    }

    #[test]
    fn test_refresh_is_noop_for_dnf() {
        let runner = MockRunner::new();
        let backend = CliBackend::new(PackageManager::Dnf, &runner);

        backend.refresh().unwrap();
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_empty_install_runs_nothing() {
        let runner = MockRunner::new();
        let backend = CliBackend::new(PackageManager::Apt, &runner);

        backend.install(&[]).unwrap();
        assert!(runner.calls().is_empty());
    }
}
