//! Installation directory management
//!
//! The active workspace is never overwritten in place. An existing one is
//! renamed to a timestamped backup first, and backups are never removed.

use chrono::{DateTime, Local};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Timestamp format of backup suffixes
pub const BACKUP_FORMAT: &str = "%Y%m%d%H%M%S";

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("backup path {} already exists (two installs within one second?)", .0.display())]
    BackupCollision(PathBuf),

    #[error("{action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        source: io::Error,
    },
}

impl WorkspaceError {
    fn io(action: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result of preparing the installation directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationWorkspace {
    pub path: PathBuf,
    pub existed: bool,
    pub backup_path: Option<PathBuf>,
}

/// `<path>.backup.<YYYYmmddHHMMSS>`
pub fn backup_path(path: &Path, now: DateTime<Local>) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".backup.{}", now.format(BACKUP_FORMAT)));
    PathBuf::from(name)
}

/// Move any existing workspace aside and create a fresh, empty one
pub fn prepare(path: &Path, now: DateTime<Local>) -> Result<InstallationWorkspace, WorkspaceError> {
    let existed = path.exists();
    let mut backup = None;

    if existed {
        let target = backup_path(path, now);
        if target.exists() {
            return Err(WorkspaceError::BackupCollision(target));
        }
        fs::rename(path, &target).map_err(|e| WorkspaceError::io("Failed to back up", path, e))?;
        log::info!("Backed up {} to {}", path.display(), target.display());
        backup = Some(target);
    }

    fs::create_dir_all(path).map_err(|e| WorkspaceError::io("Failed to create", path, e))?;

    Ok(InstallationWorkspace {
        path: path.to_path_buf(),
        existed,
        backup_path: backup,
    })
}

/// Copy `file_name` from the backup into the fresh workspace, if the backup has it
pub fn carry_forward(
    workspace: &InstallationWorkspace,
    file_name: &str,
) -> Result<bool, WorkspaceError> {
    let Some(backup) = &workspace.backup_path else {
        return Ok(false);
    };

    let source = backup.join(file_name);
    if !source.is_file() {
        return Ok(false);
    }

    let target = workspace.path.join(file_name);
    fs::copy(&source, &target).map_err(|e| WorkspaceError::io("Failed to copy", &source, e))?;
    log::info!("Carried {} forward from {}", file_name, backup.display());
    Ok(true)
}

/// Remove the workspace tree. A missing tree is not an error.
pub fn teardown(path: &Path) -> Result<bool, WorkspaceError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(WorkspaceError::io("Failed to remove", path, e)),
    }
}

/// Backups of `path` that exist on disk, oldest first
pub fn list_backups(path: &Path) -> Vec<PathBuf> {
    let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
        return Vec::new();
    };
    let prefix = format!("{}.backup.", name.to_string_lossy());

    let mut backups: Vec<PathBuf> = fs::read_dir(parent)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| e.file_name().to_string_lossy().starts_with(&prefix))
                .map(|e| e.path())
                .collect()
        })
        .unwrap_or_default();
    backups.sort();
    backups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at(secs: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2026, 3, 1, 12, 0, secs)
            .single()
            .unwrap()
    }

    #[test]
    fn test_backup_path_format() {
        let path = backup_path(Path::new("/opt/panel"), at(7));
        assert_eq!(path, PathBuf::from("/opt/panel.backup.20260301120007"));
    }

    #[test]
    fn test_prepare_fresh() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("panel");

        let ws = prepare(&path, at(0)).unwrap();
        assert!(!ws.existed);
        assert!(ws.backup_path.is_none());
        assert!(path.is_dir());
    }

    #[test]
    fn test_prepare_existing_moves_aside() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("panel");
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join("main.py"), "print()").unwrap();

        let ws = prepare(&path, at(1)).unwrap();
        assert!(ws.existed);
        let backup = ws.backup_path.unwrap();
        assert!(backup.join("main.py").is_file());
        assert_eq!(fs::read_dir(&path).unwrap().count(), 0);
        assert_eq!(list_backups(&path), vec![backup]);
    }

    #[test]
    fn test_prepare_same_second_collides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("panel");
        fs::create_dir_all(&path).unwrap();

        prepare(&path, at(2)).unwrap();
        fs::write(path.join("marker"), "second").unwrap();

        let err = prepare(&path, at(2)).unwrap_err();
        assert!(matches!(err, WorkspaceError::BackupCollision(_)));
        // Nothing was overwritten
        assert!(path.join("marker").is_file());
        assert_eq!(list_backups(&path).len(), 1);
    }

    #[test]
    fn test_carry_forward_env() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("panel");
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join(".env"), "JWT_SECRET_KEY = \"abc\"\n").unwrap();
        fs::write(path.join("other"), "x").unwrap();

        let ws = prepare(&path, at(3)).unwrap();
        assert!(carry_forward(&ws, ".env").unwrap());
        assert!(path.join(".env").is_file());
        assert!(!path.join("other").exists());
    }

    #[test]
    fn test_carry_forward_without_backup() {
        let dir = TempDir::new().unwrap();
        let ws = prepare(&dir.path().join("panel"), at(4)).unwrap();
        assert!(!carry_forward(&ws, ".env").unwrap());
    }

    #[test]
    fn test_teardown() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("panel");
        fs::create_dir_all(path.join("app")).unwrap();

        assert!(teardown(&path).unwrap());
        assert!(!path.exists());
        assert!(!teardown(&path).unwrap());
    }
}
