//! Database steps

use anyhow::Result;
use chrono::{DateTime, Local};
use declarative::{ApplyContext, ApplyResult, Resource, ResourceState};
use std::path::PathBuf;
use std::time::Duration;

use crate::config;
use crate::migrate;
use crate::paths::Layout;
use crate::snapshot;

/// `alembic upgrade head`; alembic itself skips applied revisions
pub struct SchemaMigration<'a> {
    layout: &'a Layout,
    timeout: Option<Duration>,
}

impl<'a> SchemaMigration<'a> {
    pub fn new(layout: &'a Layout, timeout: Option<Duration>) -> Self {
        Self { layout, timeout }
    }
}

impl Resource for SchemaMigration<'_> {
    fn id(&self) -> String {
        "migrations".to_string()
    }

    fn description(&self) -> String {
        "Apply database migrations".to_string()
    }

    fn resource_type(&self) -> &'static str {
        "migration"
    }

    fn current_state(&self, _ctx: &ApplyContext) -> Result<ResourceState> {
        Ok(if self.layout.database.is_file() {
            ResourceState::Present { details: None }
        } else {
            ResourceState::Absent
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present {
            details: Some("head".to_string()),
        }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let existed = self.layout.database.is_file();
        migrate::migrate(self.layout, ctx.runner, self.timeout)?;
        Ok(if existed {
            ApplyResult::Modified
        } else {
            ApplyResult::Created
        })
    }
}

/// Timestamped copy of the SQLite store, taken before an update migrates
pub struct DatabaseBackup<'a> {
    layout: &'a Layout,
    clock: fn() -> DateTime<Local>,
}

impl<'a> DatabaseBackup<'a> {
    pub fn new(layout: &'a Layout, clock: fn() -> DateTime<Local>) -> Self {
        Self { layout, clock }
    }

    /// The database named by the env file, if it is SQLite
    fn database(&self) -> Result<Option<PathBuf>> {
        let env = if self.layout.env_file.is_file() {
            config::read(&self.layout.env_file)?
        } else {
            Default::default()
        };
        Ok(snapshot::database_path(self.layout, &env))
    }
}

impl Resource for DatabaseBackup<'_> {
    fn id(&self) -> String {
        "snapshot".to_string()
    }

    fn description(&self) -> String {
        "Snapshot database".to_string()
    }

    fn resource_type(&self) -> &'static str {
        "snapshot"
    }

    fn current_state(&self, _ctx: &ApplyContext) -> Result<ResourceState> {
        Ok(match self.database()? {
            Some(db) if db.is_file() => ResourceState::Present {
                details: Some(db.display().to_string()),
            },
            Some(_) => ResourceState::Absent,
            None => ResourceState::Unknown,
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present {
            details: Some("snapshot taken".to_string()),
        }
    }

    /// A missing SQLite file needs nothing; other databases reach `apply` to be reported
    fn needs_apply(&self, ctx: &ApplyContext) -> Result<bool> {
        Ok(!matches!(self.current_state(ctx)?, ResourceState::Absent))
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let Some(db) = self.database()? else {
            log::warn!("Database is not SQLite; skipping snapshot");
            return Ok(ApplyResult::Skipped {
                reason: "not a SQLite database".to_string(),
            });
        };
        Ok(match snapshot::take(&db, (self.clock)())? {
            Some(_) => ApplyResult::Created,
            None => ApplyResult::NoChange,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::MockRunner;
    use std::fs;
    use tempfile::TempDir;

    fn clock() -> DateTime<Local> {
        Local::now()
    }

    #[test]
    fn test_no_database_means_no_snapshot() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::from_root(dir.path());
        let step = DatabaseBackup::new(&layout, clock);
        let runner = MockRunner::new();
        let ctx = ApplyContext::new(false, false, &runner);

        assert!(!step.needs_apply(&ctx).unwrap());
    }

    #[test]
    fn test_non_sqlite_is_not_snapshotted() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::from_root(dir.path());
        fs::create_dir_all(&layout.workspace).unwrap();
        fs::write(
            &layout.env_file,
            "SQLALCHEMY_DATABASE_URL = \"mysql+pymysql://panel@db/panel\"\n",
        )
        .unwrap();
        let step = DatabaseBackup::new(&layout, clock);
        let runner = MockRunner::new();
        let mut ctx = ApplyContext::new(false, false, &runner);

        assert_eq!(step.current_state(&ctx).unwrap(), ResourceState::Unknown);
        assert!(step.needs_apply(&ctx).unwrap());
        assert!(matches!(
            step.apply(&mut ctx).unwrap(),
            ApplyResult::Skipped { .. }
        ));
    }
}
