//! Package manager types and command construction.

use declarative::Invocation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// System package managers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PackageManager {
    Apt,
    Yum,
    Dnf,
}

/// Packages every install needs, keyed by manager.
///
/// yum/dnf have no `python3-venv`: their `python3` already ships the venv
/// module.
const APT_PACKAGES: &[&str] = &[
    "curl",
    "unzip",
    "gcc",
    "python3",
    "python3-dev",
    "python3-pip",
    "python3-venv",
    "logrotate",
];

const RPM_PACKAGES: &[&str] = &[
    "curl",
    "unzip",
    "gcc",
    "python3",
    "python3-devel",
    "python3-pip",
    "logrotate",
];

impl PackageManager {
    /// Binary name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Apt => "apt",
            Self::Yum => "yum",
            Self::Dnf => "dnf",
        }
    }

    /// The base package list for this manager
    pub fn base_packages(&self) -> &'static [&'static str] {
        match self {
            Self::Apt => APT_PACKAGES,
            Self::Yum | Self::Dnf => RPM_PACKAGES,
        }
    }

    /// Command that exits 0 iff `package` is installed
    pub fn query(&self, package: &str) -> Invocation {
        match self {
            Self::Apt => Invocation::new("dpkg").args(["-s", package]),
            Self::Yum | Self::Dnf => Invocation::new("rpm").args(["-q", package]),
        }
    }

    /// Metadata refresh to run once before installing, if the manager needs one
    pub fn refresh(&self) -> Option<Invocation> {
        match self {
            Self::Apt => Some(
                Invocation::new("apt-get")
                    .arg("update")
                    .env("DEBIAN_FRONTEND", "noninteractive"),
            ),
            Self::Yum | Self::Dnf => None,
        }
    }

    /// Non-interactive install of `packages`
    pub fn install<S: AsRef<str>>(&self, packages: &[S]) -> Invocation {
        let program = match self {
            Self::Apt => "apt-get",
            Self::Yum => "yum",
            Self::Dnf => "dnf",
        };
        let invocation = Invocation::new(program)
            .args(["install", "-y"])
            .args(packages.iter().map(|p| p.as_ref().to_string()));
        match self {
            Self::Apt => invocation.env("DEBIAN_FRONTEND", "noninteractive"),
            Self::Yum | Self::Dnf => invocation,
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
