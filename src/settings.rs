//! Orchestrator settings
//!
//! An optional TOML file tunes where the application comes from and how the
//! service is exposed. Every field has a default, so an absent file (the
//! common case) means a stock installation.
//!
//! ```toml
//! [source]
//! repo = "Gozargah/Marzban"
//! git_ref = "v0.8.4"
//!
//! [server]
//! bind_port = 8080
//!
//! [firewall]
//! ports = [8080, 443]
//! ```

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::paths::Layout;
use crate::service::RestartPolicy;

/// Environment variable naming the settings file
pub const ENV_CONFIG: &str = "PANELCTL_CONFIG";

/// Environment variable overriding the application source ref
pub const ENV_VERSION: &str = "PANELCTL_VERSION";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub source: SourceSettings,
    pub core: CoreSettings,
    pub server: ServerSettings,
    pub firewall: FirewallSettings,
    pub migration: MigrationSettings,
    pub service: ServiceSettings,
}

/// Where the application source tarball comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// GitHub `owner/name`
    pub repo: String,
    /// Branch, tag or commit
    pub git_ref: String,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            repo: "Gozargah/Marzban".to_string(),
            git_ref: "master".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreSettings {
    pub repo: String,
    /// Pinned release tag; latest when unset
    pub version: Option<String>,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            repo: "XTLS/Xray-core".to_string(),
            version: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_host: String,
    pub bind_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            bind_port: 8000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirewallSettings {
    pub enabled: bool,
    /// Extra ports to open; the bind port is always included
    pub ports: Vec<u16>,
}

impl Default for FirewallSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ports: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationSettings {
    /// 0 disables the bound
    pub timeout_secs: u64,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self { timeout_secs: 300 }
    }
}

impl MigrationSettings {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    pub restart_policy: RestartPolicy,
}

impl Settings {
    /// Load settings for this run.
    ///
    /// Lookup order: `explicit` (from `--config`), then `PANELCTL_CONFIG`,
    /// then the layout's settings file. An explicitly named file must exist;
    /// the default location may be absent.
    pub fn load(explicit: Option<&Path>, layout: &Layout) -> Result<Self> {
        let from_env = std::env::var(ENV_CONFIG).ok().map(PathBuf::from);

        let mut settings = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::load_from(&path)?,
            None if layout.settings_file.exists() => Self::load_from(&layout.settings_file)?,
            None => {
                log::debug!("No settings file, using defaults");
                Self::default()
            }
        };

        settings.apply_overrides(std::env::var(ENV_VERSION).ok());
        settings.validate()?;
        Ok(settings)
    }

    /// Parse a settings file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read settings file: {}", path.display()))?;
        log::debug!("Loaded settings from {}", path.display());
        toml::from_str(&content)
            .with_context(|| format!("Invalid TOML in settings file: {}", path.display()))
    }

    /// Apply the source ref override, ignoring blank values
    pub fn apply_overrides(&mut self, version: Option<String>) {
        if let Some(version) = version.filter(|v| !v.trim().is_empty()) {
            log::debug!("Source ref overridden by {}: {}", ENV_VERSION, version);
            self.source.git_ref = version.trim().to_string();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.repo.split('/').filter(|p| !p.is_empty()).count() != 2 {
            bail!(
                "source.repo must look like owner/name, got '{}'",
                self.source.repo
            );
        }
        if self.source.git_ref.trim().is_empty() {
            bail!("source.git_ref cannot be empty");
        }
        if self.core.repo.split('/').filter(|p| !p.is_empty()).count() != 2 {
            bail!("core.repo must look like owner/name, got '{}'", self.core.repo);
        }
        if self.server.bind_host.trim().is_empty() {
            bail!("server.bind_host cannot be empty");
        }
        if self.server.bind_port == 0 {
            bail!("server.bind_port cannot be 0");
        }
        if self.firewall.ports.contains(&0) {
            bail!("firewall.ports cannot contain 0");
        }
        Ok(())
    }

    /// Ports the firewall step opens: the bind port, then extras, deduplicated
    pub fn firewall_ports(&self) -> Vec<u16> {
        let mut ports = vec![self.server.bind_port];
        for port in &self.firewall.ports {
            if !ports.contains(port) {
                ports.push(*port);
            }
        }
        ports
    }
}
