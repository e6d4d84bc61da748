//! System packages and the Python runtime
//!
//! Package installs go through `syspkg`, which only hands missing packages
//! to the package manager. The Python side always runs in full: pip is
//! cheap to re-run and has its own idempotence.

use declarative::{Invocation, Runner};
use std::path::Path;
use syspkg::PackageManager;

use crate::paths::Layout;

/// Libraries the limits subsystem imports but the application manifest omits
pub const LIMITS_LIBRARIES: [&str; 3] = ["httpx", "sqlalchemy", "alembic"];

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("system packages: {0}")]
    Packages(#[from] syspkg::Error),

    #[error("python environment ({step}): {message}")]
    Python { step: &'static str, message: String },
}

/// Install the base packages for `manager`. Returns what was installed.
pub fn install_packages(
    manager: PackageManager,
    runner: &dyn Runner,
) -> Result<Vec<String>, ProvisionError> {
    let client = syspkg::Client::for_manager(manager, runner);
    Ok(client.ensure(manager.base_packages())?)
}

/// Packages from the base list that are not installed yet
pub fn missing_packages(
    manager: PackageManager,
    runner: &dyn Runner,
) -> Result<Vec<String>, ProvisionError> {
    let client = syspkg::Client::for_manager(manager, runner);
    Ok(client.audit(manager.base_packages())?.missing)
}

/// The pip commands that populate the virtual environment, in order
pub fn pip_invocations(layout: &Layout) -> Vec<(&'static str, Invocation)> {
    let pip = layout.venv_bin("pip").display().to_string();
    let requirements = layout.workspace.join("requirements.txt");

    vec![
        (
            "upgrade pip",
            Invocation::new(&pip).args(["install", "--upgrade", "pip"]),
        ),
        (
            "install requirements",
            Invocation::new(&pip)
                .args(["install", "-r"])
                .arg(requirements.display().to_string())
                .current_dir(&layout.workspace),
        ),
        (
            "install limits libraries",
            Invocation::new(&pip).arg("install").args(LIMITS_LIBRARIES),
        ),
    ]
}

/// Create the virtual environment unless it already has an interpreter
pub fn ensure_venv(layout: &Layout, runner: &dyn Runner) -> Result<bool, ProvisionError> {
    if has_venv(&layout.venv) {
        return Ok(false);
    }
    run(
        runner,
        "create venv",
        &Invocation::new("python3")
            .args(["-m", "venv"])
            .arg(layout.venv.display().to_string()),
    )?;
    Ok(true)
}

/// Create the venv if needed, then install every Python dependency
pub fn install_python(layout: &Layout, runner: &dyn Runner) -> Result<(), ProvisionError> {
    ensure_venv(layout, runner)?;
    for (step, invocation) in pip_invocations(layout) {
        log::info!("pip: {}", step);
        run(runner, step, &invocation)?;
    }
    Ok(())
}

pub fn has_venv(venv: &Path) -> bool {
    venv.join("bin/python").exists() || venv.join("pyvenv.cfg").is_file()
}

fn run(runner: &dyn Runner, step: &'static str, invocation: &Invocation) -> Result<(), ProvisionError> {
    runner
        .run_checked(invocation)
        .map(|_| ())
        .map_err(|e| ProvisionError::Python {
            step,
            message: format!("{e:#}"),
        })
}
