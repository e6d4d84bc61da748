//! Privilege checks
//!
//! Mutating commands need effective UID 0. panelctl never escalates on its
//! own; it refuses to start and tells the operator to re-run with sudo.

/// Raised before any work when a mutating command runs unprivileged
#[derive(Debug, thiserror::Error)]
#[error("`panelctl {action}` must run as root (try: sudo panelctl {action})")]
pub struct PrivilegeError {
    pub action: String,
}

/// Whether the process runs with effective UID 0
pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    #[allow(unsafe_code)]
    let euid = unsafe { libc::geteuid() };
    euid == 0
}

/// Fail with [`PrivilegeError`] unless running as root
pub fn require_root(action: &str) -> Result<(), PrivilegeError> {
    check(is_root(), action)
}

fn check(root: bool, action: &str) -> Result<(), PrivilegeError> {
    if root {
        Ok(())
    } else {
        Err(PrivilegeError {
            action: action.to_string(),
        })
    }
}
