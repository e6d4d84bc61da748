//! Fixed host paths for a panel installation
//!
//! Every path the orchestrator touches is derived from a single root, `/` on
//! a real host. Tests and staging hosts re-root the whole layout.
//!
//! # Environment Variables
//!
//! - `PANELCTL_ROOT` - Re-root every path below (e.g. `/tmp/stage`)

use std::path::{Path, PathBuf};

/// Environment variable for re-rooting the layout
pub const ENV_ROOT: &str = "PANELCTL_ROOT";

/// Name of the systemd unit and of the log-rotation policy file
pub const SERVICE_NAME: &str = "panel";

/// Resolved set of fixed host paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub root: PathBuf,
    pub workspace: PathBuf,
    pub env_file: PathBuf,
    pub venv: PathBuf,
    pub unit_file: PathBuf,
    pub logrotate_file: PathBuf,
    pub data_dir: PathBuf,
    pub database: PathBuf,
    pub core_dir: PathBuf,
    pub log_dir: PathBuf,
    pub settings_file: PathBuf,
    pub staging_dir: PathBuf,
}

impl Layout {
    /// Layout rooted at `root`
    pub fn from_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let workspace = root.join("opt").join(SERVICE_NAME);
        let data_dir = root.join("var/lib").join(SERVICE_NAME);

        Self {
            env_file: workspace.join(".env"),
            venv: workspace.join("venv"),
            unit_file: root
                .join("etc/systemd/system")
                .join(format!("{SERVICE_NAME}.service")),
            logrotate_file: root.join("etc/logrotate.d").join(SERVICE_NAME),
            database: data_dir.join("db.sqlite3"),
            core_dir: data_dir.join("xray-core"),
            log_dir: root.join("var/log").join(SERVICE_NAME),
            settings_file: root.join("etc/panelctl/config.toml"),
            staging_dir: root.join("tmp"),
            workspace,
            data_dir,
            root,
        }
    }

    /// Layout for this host, honoring `PANELCTL_ROOT`
    pub fn resolve() -> Self {
        match std::env::var(ENV_ROOT) {
            Ok(root) if !root.trim().is_empty() => {
                log::debug!("Using layout root from {}: {}", ENV_ROOT, root);
                Self::from_root(root)
            }
            _ => Self::from_root("/"),
        }
    }

    /// Map an absolute host path (as written in generated files) into this layout
    pub fn rebase(&self, path: &Path) -> PathBuf {
        match path.strip_prefix("/") {
            Ok(relative) => self.root.join(relative),
            Err(_) => path.to_path_buf(),
        }
    }

    /// Path as it appears on the target host, with the layout root removed
    pub fn host_path(&self, path: &Path) -> PathBuf {
        match path.strip_prefix(&self.root) {
            Ok(relative) => Path::new("/").join(relative),
            Err(_) => path.to_path_buf(),
        }
    }

    /// Executable inside the workspace virtual environment
    pub fn venv_bin(&self, program: &str) -> PathBuf {
        self.venv.join("bin").join(program)
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::from_root("/")
    }
}
