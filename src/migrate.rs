//! Database schema migrations
//!
//! A single bounded `alembic upgrade head`. No retries and no partial
//! recovery: a failed or timed-out migration aborts the run.

use declarative::{Invocation, Runner};
use std::fs;
use std::time::Duration;

use crate::paths::Layout;

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("migration timed out after {0} seconds")]
    Timeout(u64),

    #[error("migration failed: {0}")]
    Failed(String),

    #[error("migration environment: {0}")]
    Environment(String),
}

pub fn upgrade_invocation(layout: &Layout, timeout: Option<Duration>) -> Invocation {
    Invocation::new(layout.venv_bin("alembic").display().to_string())
        .args(["upgrade", "head"])
        .current_dir(&layout.workspace)
        .timeout(timeout)
}

/// Make sure `packaging` is importable from the venv, installing it if not
fn ensure_packaging(layout: &Layout, runner: &dyn Runner) -> Result<(), MigrationError> {
    let python = layout.venv_bin("python").display().to_string();
    let present = runner
        .run_status(&Invocation::new(&python).args(["-c", "import packaging"]))
        .map_err(|e| MigrationError::Environment(format!("{e:#}")))?;
    if present {
        return Ok(());
    }

    log::info!("Installing missing `packaging` into the venv");
    runner
        .run_checked(
            &Invocation::new(layout.venv_bin("pip").display().to_string())
                .args(["install", "packaging"]),
        )
        .map(|_| ())
        .map_err(|e| MigrationError::Environment(format!("{e:#}")))
}

/// Run migrations to head, bounded by `timeout` (`None` waits indefinitely)
pub fn migrate(
    layout: &Layout,
    runner: &dyn Runner,
    timeout: Option<Duration>,
) -> Result<(), MigrationError> {
    ensure_packaging(layout, runner)?;

    fs::create_dir_all(&layout.data_dir).map_err(|e| {
        MigrationError::Environment(format!(
            "cannot create {}: {e}",
            layout.data_dir.display()
        ))
    })?;

    let output = runner
        .run(&upgrade_invocation(layout, timeout))
        .map_err(|e| MigrationError::Failed(format!("{e:#}")))?;

    if output.timed_out {
        return Err(MigrationError::Timeout(
            timeout.map_or(0, |t| t.as_secs()),
        ));
    }
    if !output.success {
        let stderr = output.stderr_str().trim().to_string();
        return Err(MigrationError::Failed(if stderr.is_empty() {
            "alembic exited unsuccessfully".to_string()
        } else {
            stderr
        }));
    }

    log::info!("Database schema is at head");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{CommandOutput, MockRunner};
    use tempfile::TempDir;

    fn setup() -> (TempDir, Layout, MockRunner) {
        let dir = TempDir::new().unwrap();
        let layout = Layout::from_root(dir.path());
        (dir, layout, MockRunner::new())
    }

    #[test]
    fn test_migrate_creates_data_dir_and_runs_bounded() {
        let (_dir, layout, runner) = setup();

        migrate(&layout, &runner, Some(Duration::from_secs(300))).unwrap();

        assert!(layout.data_dir.is_dir());
        let calls = runner.calls();
        let upgrade = calls.last().unwrap();
        assert!(upgrade.command_line().ends_with("alembic upgrade head"));
        assert_eq!(upgrade.timeout, Some(Duration::from_secs(300)));
        assert_eq!(upgrade.cwd.as_deref(), Some(layout.workspace.as_path()));
    }

    #[test]
    fn test_missing_packaging_is_installed_first() {
        let (_dir, layout, runner) = setup();
        let python = layout.venv_bin("python").display().to_string();
        runner.fail(&format!("{python} -c"), "ModuleNotFoundError");

        migrate(&layout, &runner, None).unwrap();

        let lines = runner.command_lines();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].ends_with("pip install packaging"));
    }

    #[test]
    fn test_timeout() {
        let (_dir, layout, runner) = setup();
        let alembic = layout.venv_bin("alembic").display().to_string();
        runner.respond(&alembic, CommandOutput::timeout());

        let err = migrate(&layout, &runner, Some(Duration::from_secs(300))).unwrap_err();
        assert!(matches!(err, MigrationError::Timeout(300)));
    }

    #[test]
    fn test_failure_carries_stderr() {
        let (_dir, layout, runner) = setup();
        let alembic = layout.venv_bin("alembic").display().to_string();
        runner.fail(&alembic, "sqlalchemy.exc.OperationalError\n");

        let err = migrate(&layout, &runner, None).unwrap_err();
        assert!(matches!(err, MigrationError::Failed(ref m) if m == "sqlalchemy.exc.OperationalError"));
    }
}
