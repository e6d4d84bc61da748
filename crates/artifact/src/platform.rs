//! CPU architecture mapping for release assets.
//!
//! Core releases name their Linux assets by a short architecture token
//! (`Xray-linux-64.zip`, `Xray-linux-arm64-v8a.zip`, ...). This module maps
//! the machine string reported by `uname -m` onto that closed set.
//!
//! # Supported Machines
//!
//! | `uname -m` | Token       |
//! |------------|-------------|
//! | x86_64     | `64`        |
//! | aarch64    | `arm64-v8a` |
//! | armv7l     | `arm32-v7a` |

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A supported CPU architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Arch {
    /// 64-bit x86.
    X86_64,
    /// 64-bit ARM.
    Aarch64,
    /// 32-bit ARMv7.
    Armv7,
}

impl Arch {
    /// Map a `uname -m` machine string.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedArch` for anything outside the supported set.
    pub fn from_machine(machine: &str) -> Result<Self> {
        match machine.trim() {
            "x86_64" => Ok(Self::X86_64),
            "aarch64" => Ok(Self::Aarch64),
            "armv7l" => Ok(Self::Armv7),
            other => Err(Error::UnsupportedArch {
                machine: other.to_string(),
            }),
        }
    }

    /// Token used in release asset names.
    #[must_use]
    pub fn token(&self) -> &'static str {
        match self {
            Self::X86_64 => "64",
            Self::Aarch64 => "arm64-v8a",
            Self::Armv7 => "arm32-v7a",
        }
    }

    /// Machine string this architecture was detected from.
    #[must_use]
    pub fn machine(&self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Aarch64 => "aarch64",
            Self::Armv7 => "armv7l",
        }
    }

    /// Name of the core release asset for this architecture.
    #[must_use]
    pub fn core_asset_name(&self) -> String {
        format!("Xray-linux-{}.zip", self.token())
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_machines() {
        assert_eq!(Arch::from_machine("x86_64").unwrap().token(), "64");
        assert_eq!(Arch::from_machine("aarch64").unwrap().token(), "arm64-v8a");
        assert_eq!(Arch::from_machine("armv7l").unwrap().token(), "arm32-v7a");
    }

    #[test]
    fn test_machine_string_is_trimmed() {
        assert_eq!(Arch::from_machine("x86_64\n").unwrap(), Arch::X86_64);
    }

    #[test]
    fn test_unsupported_machines() {
        for machine in ["mips", "i686", "riscv64", "armv6l", ""] {
            let err = Arch::from_machine(machine).unwrap_err();
            assert!(matches!(err, Error::UnsupportedArch { .. }), "{machine}");
        }
    }

    #[test]
    fn test_core_asset_name() {
        assert_eq!(Arch::X86_64.core_asset_name(), "Xray-linux-64.zip");
        assert_eq!(Arch::Armv7.core_asset_name(), "Xray-linux-arm32-v7a.zip");
    }

    #[test]
    fn test_machine_round_trip() {
        for arch in [Arch::X86_64, Arch::Aarch64, Arch::Armv7] {
            assert_eq!(Arch::from_machine(arch.machine()).unwrap(), arch);
        }
    }
}
