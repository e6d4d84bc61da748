//! Distribution detection by marker files.
//!
//! Markers are checked in a fixed priority order and the first match wins.
//! Every check is relative to a root directory so tests can point it at a
//! temporary tree.

use crate::error::{Error, Result};
use crate::types::PackageManager;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// Supported distribution families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OsFamily {
    Debian,
    Ubuntu,
    CentOs,
    Fedora,
}

impl OsFamily {
    /// Detect the distribution below `root` (`/` on a real host)
    ///
    /// Order: `/etc/debian_version`, `/etc/lsb-release` with
    /// `DISTRIB_ID=Ubuntu`, `/etc/centos-release`, `/etc/fedora-release`.
    pub fn detect(root: &Path) -> Result<Self> {
        let etc = root.join("etc");

        if etc.join("debian_version").is_file() {
            return Ok(Self::Debian);
        }

        if let Ok(content) = fs::read_to_string(etc.join("lsb-release"))
            && content
                .lines()
                .any(|line| line.trim().trim_matches('"') == "DISTRIB_ID=Ubuntu")
        {
            return Ok(Self::Ubuntu);
        }

        if etc.join("centos-release").is_file() {
            return Ok(Self::CentOs);
        }

        if etc.join("fedora-release").is_file() {
            return Ok(Self::Fedora);
        }

        Err(Error::UnsupportedOs)
    }

    /// Package manager used on this family
    pub fn package_manager(&self) -> PackageManager {
        match self {
            Self::Debian | Self::Ubuntu => PackageManager::Apt,
            Self::CentOs => PackageManager::Yum,
            Self::Fedora => PackageManager::Dnf,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Debian => "Debian",
            Self::Ubuntu => "Ubuntu",
            Self::CentOs => "CentOS",
            Self::Fedora => "Fedora",
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn root_with(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("etc")).unwrap();
        for (name, content) in files {
            fs::write(dir.path().join("etc").join(name), content).unwrap();
        }
        dir
    }

    #[test]
    fn test_detect_debian() {
        let root = root_with(&[("debian_version", "12.5\n")]);
        assert_eq!(OsFamily::detect(root.path()).unwrap(), OsFamily::Debian);
    }

    #[test]
    fn test_detect_ubuntu() {
        let root = root_with(&[("lsb-release", "DISTRIB_ID=Ubuntu\nDISTRIB_RELEASE=22.04\n")]);
        assert_eq!(OsFamily::detect(root.path()).unwrap(), OsFamily::Ubuntu);
    }

    #[test]
    fn test_lsb_release_for_other_distro_is_ignored() {
        let root = root_with(&[("lsb-release", "DISTRIB_ID=LinuxMint\n")]);
        assert!(OsFamily::detect(root.path()).is_err());
    }

    #[test]
    fn test_debian_marker_wins_over_ubuntu() {
        // Ubuntu ships /etc/debian_version too
        let root = root_with(&[
            ("debian_version", "bookworm/sid\n"),
            ("lsb-release", "DISTRIB_ID=Ubuntu\n"),
        ]);
        assert_eq!(OsFamily::detect(root.path()).unwrap(), OsFamily::Debian);
    }

    #[test]
    fn test_detect_centos_and_fedora() {
        let centos = root_with(&[("centos-release", "CentOS Stream release 9\n")]);
        assert_eq!(OsFamily::detect(centos.path()).unwrap(), OsFamily::CentOs);

        let fedora = root_with(&[("fedora-release", "Fedora release 40\n")]);
        assert_eq!(OsFamily::detect(fedora.path()).unwrap(), OsFamily::Fedora);
    }

    #[test]
    fn test_no_marker_is_unsupported() {
        let root = root_with(&[("arch-release", "")]);
        assert!(matches!(
            OsFamily::detect(root.path()),
            Err(Error::UnsupportedOs)
        ));
    }

    #[test]
    fn test_package_manager_mapping() {
        assert_eq!(OsFamily::Debian.package_manager(), PackageManager::Apt);
        assert_eq!(OsFamily::Ubuntu.package_manager(), PackageManager::Apt);
        assert_eq!(OsFamily::CentOs.package_manager(), PackageManager::Yum);
        assert_eq!(OsFamily::Fedora.package_manager(), PackageManager::Dnf);
    }
}
