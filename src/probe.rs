//! Host detection
//!
//! Read-only. Architecture comes first so an unsupported CPU stops the run
//! before anything else is looked at.

use artifact::Arch;
use declarative::{Invocation, Runner};
use std::fmt;
use std::path::Path;
use syspkg::{OsFamily, PackageManager};

#[derive(Debug, thiserror::Error)]
pub enum UnsupportedHost {
    #[error("unsupported CPU architecture: {0}")]
    Architecture(String),

    #[error("could not determine CPU architecture: {0}")]
    ArchitectureUnknown(String),

    #[error("unsupported operating system (expected Debian, Ubuntu, CentOS or Fedora)")]
    OperatingSystem,
}

/// What the rest of the run needs to know about the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostProfile {
    pub os_family: OsFamily,
    pub package_manager: PackageManager,
    pub arch: Arch,
}

impl fmt::Display for HostProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {})",
            self.os_family,
            self.arch.machine(),
            self.package_manager
        )
    }
}

/// Detect the host below `root`
pub fn probe(runner: &dyn Runner, root: &Path) -> Result<HostProfile, UnsupportedHost> {
    let machine = runner
        .run_capture(&Invocation::new("uname").arg("-m"))
        .map_err(|e| UnsupportedHost::ArchitectureUnknown(format!("{e:#}")))?;
    let arch = Arch::from_machine(&machine)
        .map_err(|_| UnsupportedHost::Architecture(machine.clone()))?;

    let os_family = OsFamily::detect(root).map_err(|_| UnsupportedHost::OperatingSystem)?;

    let profile = HostProfile {
        os_family,
        package_manager: os_family.package_manager(),
        arch,
    };
    log::debug!("Detected host: {}", profile);
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{CommandOutput, MockRunner};
    use std::fs;
    use tempfile::TempDir;

    fn host(marker: &str, content: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("etc")).unwrap();
        fs::write(dir.path().join("etc").join(marker), content).unwrap();
        dir
    }

    #[test]
    fn test_probe_debian_x86_64() {
        let root = host("debian_version", "12.5\n");
        let runner = MockRunner::new();
        runner.respond("uname -m", CommandOutput::ok("x86_64\n"));

        let profile = probe(&runner, root.path()).unwrap();
        assert_eq!(profile.os_family, OsFamily::Debian);
        assert_eq!(profile.package_manager, PackageManager::Apt);
        assert_eq!(profile.arch.token(), "64");
    }

    #[test]
    fn test_probe_fedora_arm() {
        let root = host("fedora-release", "Fedora release 40\n");
        let runner = MockRunner::new();
        runner.respond("uname -m", CommandOutput::ok("aarch64\n"));

        let profile = probe(&runner, root.path()).unwrap();
        assert_eq!(profile.package_manager, PackageManager::Dnf);
        assert_eq!(profile.arch.token(), "arm64-v8a");
    }

    #[test]
    fn test_unknown_arch_stops_before_os_detection() {
        // No marker files at all: the architecture error must win
        let root = TempDir::new().unwrap();
        let runner = MockRunner::new();
        runner.respond("uname -m", CommandOutput::ok("mips64\n"));

        let err = probe(&runner, root.path()).unwrap_err();
        assert!(matches!(err, UnsupportedHost::Architecture(m) if m == "mips64"));
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn test_unknown_os() {
        let root = TempDir::new().unwrap();
        let runner = MockRunner::new();
        runner.respond("uname -m", CommandOutput::ok("armv7l"));

        let err = probe(&runner, root.path()).unwrap_err();
        assert!(matches!(err, UnsupportedHost::OperatingSystem));
    }
}
