//! Pre-update database snapshot
//!
//! Before `update` migrates, the SQLite store is copied next to itself with
//! `VACUUM INTO`, which produces a consistent copy even while the service is
//! still writing. Snapshots are never deleted by panelctl.

use chrono::{DateTime, Local};
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::DATABASE_URL_KEY;
use crate::paths::Layout;
use crate::workspace::BACKUP_FORMAT;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot {} already exists", .0.display())]
    Exists(PathBuf),

    #[error("cannot snapshot {}: {source}", path.display())]
    Sqlite {
        path: PathBuf,
        source: rusqlite::Error,
    },
}

/// A timestamped copy of the data store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSnapshot {
    pub source: PathBuf,
    pub path: PathBuf,
    pub taken_at: DateTime<Local>,
}

/// Database file named by a `sqlite:///<path>` URL; `None` for other engines
pub fn sqlite_path(url: &str) -> Option<PathBuf> {
    let path = url.trim().strip_prefix("sqlite:///")?;
    (!path.is_empty()).then(|| PathBuf::from(path))
}

/// The database this installation uses, mapped into `layout`.
///
/// Falls back to the default database when the env file names none.
pub fn database_path(layout: &Layout, env: &BTreeMap<String, String>) -> Option<PathBuf> {
    match env.get(DATABASE_URL_KEY) {
        Some(url) => sqlite_path(url).map(|p| {
            if p.is_absolute() {
                layout.rebase(&p)
            } else {
                layout.workspace.join(p)
            }
        }),
        None => Some(layout.database.clone()),
    }
}

pub fn snapshot_path(database: &Path, now: DateTime<Local>) -> PathBuf {
    let mut name = database.as_os_str().to_os_string();
    name.push(format!(".backup.{}", now.format(BACKUP_FORMAT)));
    PathBuf::from(name)
}

/// Copy `database` to a timestamped sibling.
///
/// Returns `None` without touching anything when there is no database yet.
pub fn take(database: &Path, now: DateTime<Local>) -> Result<Option<DatabaseSnapshot>, SnapshotError> {
    if !database.is_file() {
        log::info!("No database at {}, nothing to snapshot", database.display());
        return Ok(None);
    }

    let target = snapshot_path(database, now);
    if target.exists() {
        return Err(SnapshotError::Exists(target));
    }

    let sqlite = |source: rusqlite::Error| SnapshotError::Sqlite {
        path: database.to_path_buf(),
        source,
    };
    let conn = Connection::open(database).map_err(sqlite)?;
    conn.execute("VACUUM INTO ?1", [target.to_string_lossy().into_owned()])
        .map_err(sqlite)?;

    log::info!("Database snapshot written to {}", target.display());
    Ok(Some(DatabaseSnapshot {
        source: database.to_path_buf(),
        path: target,
        taken_at: now,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn now() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2026, 3, 1, 9, 30, 0)
            .single()
            .unwrap()
    }

    #[test]
    fn test_sqlite_path() {
        assert_eq!(
            sqlite_path("sqlite:////var/lib/panel/db.sqlite3"),
            Some(PathBuf::from("/var/lib/panel/db.sqlite3"))
        );
        assert_eq!(sqlite_path("sqlite:///db.sqlite3"), Some(PathBuf::from("db.sqlite3")));
        assert_eq!(sqlite_path("mysql://user@host/panel"), None);
        assert_eq!(sqlite_path("sqlite:///"), None);
    }

    #[test]
    fn test_database_path_from_env() {
        let layout = Layout::from_root("/tmp/stage");
        let mut env = BTreeMap::new();
        assert_eq!(database_path(&layout, &env), Some(layout.database.clone()));

        env.insert(
            DATABASE_URL_KEY.to_string(),
            "sqlite:////srv/panel.db".to_string(),
        );
        assert_eq!(
            database_path(&layout, &env),
            Some(PathBuf::from("/tmp/stage/srv/panel.db"))
        );

        env.insert(DATABASE_URL_KEY.to_string(), "mysql://db/panel".to_string());
        assert_eq!(database_path(&layout, &env), None);
    }

    #[test]
    fn test_take_copies_rows() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("db.sqlite3");
        let conn = Connection::open(&db).unwrap();
        conn.execute_batch("CREATE TABLE users (name TEXT); INSERT INTO users VALUES ('admin');")
            .unwrap();
        drop(conn);

        let snapshot = take(&db, now()).unwrap().unwrap();
        assert!(snapshot.path.ends_with("db.sqlite3.backup.20260301093000"));

        let copy = Connection::open(&snapshot.path).unwrap();
        let count: i64 = copy
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);

        // A second snapshot in the same second is refused, not overwritten
        assert!(matches!(take(&db, now()), Err(SnapshotError::Exists(_))));
    }

    #[test]
    fn test_take_without_database() {
        let dir = TempDir::new().unwrap();
        assert!(take(&dir.path().join("db.sqlite3"), now()).unwrap().is_none());
    }
}
