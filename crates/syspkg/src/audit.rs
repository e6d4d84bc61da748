//! Drift detection for system packages.
//!
//! Splits observation from action: [`observe`] asks the backend what is
//! installed, [`plan`] is a pure function of wanted vs installed.

use crate::backend::Backend;
use crate::error::Result;
use std::collections::HashSet;

/// Outcome of comparing wanted packages against the host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditResult {
    /// Wanted and already installed
    pub present: Vec<String>,
    /// Wanted but not installed, in declaration order
    pub missing: Vec<String>,
}

impl AuditResult {
    /// Whether every wanted package is installed
    pub fn is_satisfied(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Query which of `wanted` are installed.
pub fn observe(backend: &dyn Backend, wanted: &[&str]) -> Result<HashSet<String>> {
    let mut installed = HashSet::new();
    for package in wanted {
        if backend.is_installed(package)? {
            installed.insert((*package).to_string());
        }
    }
    Ok(installed)
}

/// Compute the install set from wanted and installed packages.
///
/// Duplicates in `wanted` are collapsed; order is preserved.
pub fn plan(wanted: &[&str], installed: &HashSet<String>) -> AuditResult {
    let mut result = AuditResult::default();
    let mut seen = HashSet::new();

    for package in wanted {
        if !seen.insert(*package) {
            continue;
        }
        if installed.contains(*package) {
            result.present.push((*package).to_string());
        } else {
            result.missing.push((*package).to_string());
        }
    }

    result
}

/// Observe then plan in one call.
pub fn audit(backend: &dyn Backend, wanted: &[&str]) -> Result<AuditResult> {
    let installed = observe(backend, wanted)?;
    Ok(plan(wanted, &installed))
}
