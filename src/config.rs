//! The panel's environment file
//!
//! Written once, on first install, with freshly generated secrets. After
//! that the file belongs to the operator: it is never rewritten, and a
//! reinstall carries it forward from the backup.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use crate::paths::Layout;
use crate::secrets;
use crate::settings::Settings;

pub const DATABASE_URL_KEY: &str = "SQLALCHEMY_DATABASE_URL";

const ADMIN_USERNAME: &str = "admin";

/// Generated secrets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Secrets {
    pub jwt_key: String,
    pub admin_username: String,
    pub admin_password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureFlags {
    pub docs: bool,
    pub debug: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            docs: true,
            debug: false,
        }
    }
}

/// Everything the environment file holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationRecord {
    pub database_url: String,
    pub bind_host: String,
    pub bind_port: u16,
    pub secrets: Secrets,
    pub core_executable: PathBuf,
    pub core_assets: PathBuf,
    pub feature_flags: FeatureFlags,
}

impl ConfigurationRecord {
    /// Fresh record with new secrets. Paths are written as seen on the host.
    pub fn generate(settings: &Settings, layout: &Layout) -> Self {
        let core_dir = layout.host_path(&layout.core_dir);
        Self {
            database_url: sqlite_url(&layout.host_path(&layout.database)),
            bind_host: settings.server.bind_host.clone(),
            bind_port: settings.server.bind_port,
            secrets: Secrets {
                jwt_key: secrets::jwt_secret(),
                admin_username: ADMIN_USERNAME.to_string(),
                admin_password: secrets::admin_password(),
            },
            core_executable: core_dir.join("xray"),
            core_assets: core_dir,
            feature_flags: FeatureFlags::default(),
        }
    }
}

impl fmt::Display for ConfigurationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "UVICORN_HOST = {}", quote(&self.bind_host))?;
        writeln!(f, "UVICORN_PORT = {}", self.bind_port)?;
        writeln!(f, "{DATABASE_URL_KEY} = {}", quote(&self.database_url))?;
        writeln!(f, "JWT_SECRET_KEY = {}", quote(&self.secrets.jwt_key))?;
        writeln!(f, "SUDO_USERNAME = {}", quote(&self.secrets.admin_username))?;
        writeln!(f, "SUDO_PASSWORD = {}", quote(&self.secrets.admin_password))?;
        writeln!(
            f,
            "XRAY_EXECUTABLE_PATH = {}",
            quote(&self.core_executable.display().to_string())
        )?;
        writeln!(
            f,
            "XRAY_ASSETS_PATH = {}",
            quote(&self.core_assets.display().to_string())
        )?;
        writeln!(f, "DOCS = {}", self.feature_flags.docs)?;
        writeln!(f, "DEBUG = {}", self.feature_flags.debug)
    }
}

/// `sqlite:///` followed by an absolute path
pub fn sqlite_url(path: &Path) -> String {
    format!("sqlite:///{}", path.display())
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    for q in ['"', '\''] {
        if let Some(inner) = value.strip_prefix(q).and_then(|v| v.strip_suffix(q)) {
            return inner.replace("\\\"", "\"").replace("\\\\", "\\");
        }
    }
    value.to_string()
}

/// Parse `key = value` lines. Comments and blank lines are skipped, quotes stripped.
pub fn parse(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), unquote(value)))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

/// Read and parse an environment file
pub fn read(path: &Path) -> Result<BTreeMap<String, String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read environment file: {}", path.display()))?;
    Ok(parse(&content))
}

/// What [`ensure_config`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOutcome {
    /// The file existed and was left untouched
    Preserved,
    Created,
}

/// Write `record()` to `path` unless the file already exists.
///
/// The record is only built (and secrets only generated) when needed. The
/// file is created with mode 0600.
pub fn ensure_config(
    path: &Path,
    record: impl FnOnce() -> ConfigurationRecord,
) -> Result<ConfigOutcome> {
    if path.exists() {
        log::info!("Keeping existing environment file {}", path.display());
        return Ok(ConfigOutcome::Preserved);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let content = record().to_string();
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
        .with_context(|| format!("Failed to create environment file: {}", path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write environment file: {}", path.display()))?;

    log::info!("Generated environment file {}", path.display());
    Ok(ConfigOutcome::Created)
}
