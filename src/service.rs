//! systemd unit management
//!
//! [`ServiceRegistrar`] owns the unit file and tracks which units were
//! written since the last `daemon-reload`. Starting or restarting a unit
//! systemd has not re-read yet is refused.

use declarative::{Invocation, Runner};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::paths::{Layout, SERVICE_NAME};
use crate::settings::Settings;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("cannot write {}: {source}", path.display())]
    Registration { path: PathBuf, source: io::Error },

    #[error("`systemctl {action} {unit}` failed: {message}")]
    Lifecycle {
        action: &'static str,
        unit: String,
        message: String,
    },

    #[error("unit {0} changed on disk; run daemon-reload before start/stop/restart")]
    StaleUnit(String),

    #[error("panel is not installed ({} is missing)", .0.display())]
    NotInstalled(PathBuf),
}

/// systemd `Restart=` values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    Always,
    #[default]
    OnFailure,
    No,
}

impl RestartPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::OnFailure => "on-failure",
            Self::No => "no",
        }
    }
}

/// A systemd service unit, rendered with [`fmt::Display`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUnit {
    pub name: String,
    pub description: String,
    pub working_directory: PathBuf,
    pub entry_point: String,
    pub environment_file: PathBuf,
    pub restart_policy: RestartPolicy,
    pub log_file: Option<PathBuf>,
}

impl ServiceUnit {
    /// The panel unit. Paths are as seen on the host.
    pub fn panel(layout: &Layout, settings: &Settings) -> Self {
        let workspace = layout.host_path(&layout.workspace);
        let python = layout.host_path(&layout.venv_bin("python3"));
        Self {
            name: SERVICE_NAME.to_string(),
            description: "Proxy panel service".to_string(),
            entry_point: format!("{} {}", python.display(), workspace.join("main.py").display()),
            environment_file: layout.host_path(&layout.env_file),
            working_directory: workspace,
            restart_policy: settings.service.restart_policy,
            log_file: Some(layout.host_path(&layout.log_dir.join(format!("{SERVICE_NAME}.log")))),
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.service", self.name)
    }
}

impl fmt::Display for ServiceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[Unit]")?;
        writeln!(f, "Description={}", self.description)?;
        writeln!(f, "After=network.target nss-lookup.target")?;
        writeln!(f)?;
        writeln!(f, "[Service]")?;
        writeln!(f, "Type=simple")?;
        writeln!(f, "WorkingDirectory={}", self.working_directory.display())?;
        writeln!(f, "EnvironmentFile={}", self.environment_file.display())?;
        writeln!(f, "ExecStart={}", self.entry_point)?;
        writeln!(f, "Restart={}", self.restart_policy.as_str())?;
        if self.restart_policy != RestartPolicy::No {
            writeln!(f, "RestartSec=5")?;
        }
        if let Some(log) = &self.log_file {
            writeln!(f, "StandardOutput=append:{}", log.display())?;
            writeln!(f, "StandardError=append:{}", log.display())?;
        }
        writeln!(f)?;
        writeln!(f, "[Install]")?;
        writeln!(f, "WantedBy=multi-user.target")
    }
}

/// logrotate policy for the service's log directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRotatePolicy {
    pub log_dir: PathBuf,
    pub keep: u32,
}

impl LogRotatePolicy {
    pub fn panel(layout: &Layout) -> Self {
        Self {
            log_dir: layout.host_path(&layout.log_dir),
            keep: 7,
        }
    }
}

impl fmt::Display for LogRotatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}/*.log {{", self.log_dir.display())?;
        writeln!(f, "    daily")?;
        writeln!(f, "    rotate {}", self.keep)?;
        writeln!(f, "    missingok")?;
        writeln!(f, "    notifempty")?;
        writeln!(f, "    compress")?;
        writeln!(f, "    delaycompress")?;
        writeln!(f, "    copytruncate")?;
        writeln!(f, "}}")
    }
}

/// The service manager, as far as panelctl drives it
pub trait Supervisor {
    fn daemon_reload(&self) -> Result<(), ServiceError>;
    fn enable(&self, unit: &str) -> Result<(), ServiceError>;
    fn disable(&self, unit: &str) -> Result<(), ServiceError>;
    fn start(&self, unit: &str) -> Result<(), ServiceError>;
    fn stop(&self, unit: &str) -> Result<(), ServiceError>;
    fn restart(&self, unit: &str) -> Result<(), ServiceError>;
    fn is_active(&self, unit: &str) -> Result<bool, ServiceError>;
    fn is_enabled(&self, unit: &str) -> Result<bool, ServiceError>;
    /// Print `systemctl status`; returns whether the unit is running
    fn status(&self, unit: &str) -> Result<bool, ServiceError>;
    /// Follow the journal until interrupted
    fn follow_logs(&self, unit: &str) -> Result<(), ServiceError>;
}

/// [`Supervisor`] backed by `systemctl` and `journalctl`
pub struct Systemd<'a> {
    runner: &'a dyn Runner,
}

impl<'a> Systemd<'a> {
    pub fn new(runner: &'a dyn Runner) -> Self {
        Self { runner }
    }

    fn systemctl(&self, action: &'static str, unit: Option<&str>) -> Result<(), ServiceError> {
        let mut invocation = Invocation::new("systemctl").arg(action);
        if let Some(unit) = unit {
            invocation = invocation.arg(unit);
        }
        self.runner
            .run_checked(&invocation)
            .map(|_| ())
            .map_err(|e| ServiceError::Lifecycle {
                action,
                unit: unit.unwrap_or_default().to_string(),
                message: format!("{e:#}"),
            })
    }

    fn query(&self, action: &'static str, unit: &str) -> Result<bool, ServiceError> {
        self.runner
            .run_status(&Invocation::new("systemctl").args([action, "--quiet", unit]))
            .map_err(|e| ServiceError::Lifecycle {
                action,
                unit: unit.to_string(),
                message: format!("{e:#}"),
            })
    }
}

impl Supervisor for Systemd<'_> {
    fn daemon_reload(&self) -> Result<(), ServiceError> {
        self.systemctl("daemon-reload", None)
    }

    fn enable(&self, unit: &str) -> Result<(), ServiceError> {
        self.systemctl("enable", Some(unit))
    }

    fn disable(&self, unit: &str) -> Result<(), ServiceError> {
        self.systemctl("disable", Some(unit))
    }

    fn start(&self, unit: &str) -> Result<(), ServiceError> {
        self.systemctl("start", Some(unit))
    }

    fn stop(&self, unit: &str) -> Result<(), ServiceError> {
        self.systemctl("stop", Some(unit))
    }

    fn restart(&self, unit: &str) -> Result<(), ServiceError> {
        self.systemctl("restart", Some(unit))
    }

    fn is_active(&self, unit: &str) -> Result<bool, ServiceError> {
        self.query("is-active", unit)
    }

    fn is_enabled(&self, unit: &str) -> Result<bool, ServiceError> {
        self.query("is-enabled", unit)
    }

    fn status(&self, unit: &str) -> Result<bool, ServiceError> {
        // Non-zero exit just means "not running"
        self.runner
            .run_status(
                &Invocation::new("systemctl")
                    .args(["status", unit, "--no-pager"])
                    .interactive(),
            )
            .map_err(|e| ServiceError::Lifecycle {
                action: "status",
                unit: unit.to_string(),
                message: format!("{e:#}"),
            })
    }

    fn follow_logs(&self, unit: &str) -> Result<(), ServiceError> {
        self.runner
            .run(
                &Invocation::new("journalctl")
                    .args(["-u", unit, "-f"])
                    .interactive(),
            )
            .map(|_| ())
            .map_err(|e| ServiceError::Lifecycle {
                action: "logs",
                unit: unit.to_string(),
                message: format!("{e:#}"),
            })
    }
}

/// Writes unit files and gates lifecycle calls on a reload
pub struct ServiceRegistrar<'a> {
    supervisor: &'a dyn Supervisor,
    stale: RefCell<BTreeSet<String>>,
}

impl<'a> ServiceRegistrar<'a> {
    pub fn new(supervisor: &'a dyn Supervisor) -> Self {
        Self {
            supervisor,
            stale: RefCell::new(BTreeSet::new()),
        }
    }

    pub fn supervisor(&self) -> &'a dyn Supervisor {
        self.supervisor
    }

    /// Write (or overwrite) the unit file; the unit is stale until [`Self::reload`]
    pub fn register(&self, unit: &ServiceUnit, path: &Path) -> Result<(), ServiceError> {
        write_file(path, &unit.to_string())?;
        self.stale.borrow_mut().insert(unit.name.clone());
        log::info!("Wrote unit {}", path.display());
        Ok(())
    }

    /// `daemon-reload`, then `enable`
    pub fn reload(&self, name: &str) -> Result<(), ServiceError> {
        self.supervisor.daemon_reload()?;
        self.stale.borrow_mut().clear();
        self.supervisor.enable(name)
    }

    pub fn is_stale(&self, name: &str) -> bool {
        self.stale.borrow().contains(name)
    }

    fn fresh(&self, name: &str) -> Result<(), ServiceError> {
        if self.is_stale(name) {
            return Err(ServiceError::StaleUnit(name.to_string()));
        }
        Ok(())
    }

    pub fn start(&self, name: &str) -> Result<(), ServiceError> {
        self.fresh(name)?;
        self.supervisor.start(name)
    }

    pub fn stop(&self, name: &str) -> Result<(), ServiceError> {
        self.fresh(name)?;
        self.supervisor.stop(name)
    }

    pub fn restart(&self, name: &str) -> Result<(), ServiceError> {
        self.fresh(name)?;
        self.supervisor.restart(name)
    }
}

/// Write a managed file, creating parent directories
pub fn write_file(path: &Path, content: &str) -> Result<(), ServiceError> {
    let result = match path.parent() {
        Some(parent) => fs::create_dir_all(parent),
        None => Ok(()),
    }
    .and_then(|()| fs::write(path, content));

    result.map_err(|source| ServiceError::Registration {
        path: path.to_path_buf(),
        source,
    })
}

/// Remove a managed file; returns whether it existed
pub fn remove_file(path: &Path) -> Result<bool, ServiceError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(ServiceError::Registration {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Fails unless the unit file is on disk
pub fn ensure_installed(layout: &Layout) -> Result<(), ServiceError> {
    if layout.unit_file.is_file() {
        Ok(())
    } else {
        Err(ServiceError::NotInstalled(layout.unit_file.clone()))
    }
}

/// Scripted supervisor for tests; records every call in order
#[cfg(test)]
#[derive(Default)]
pub struct FakeSupervisor {
    pub calls: RefCell<Vec<String>>,
    pub active: std::cell::Cell<bool>,
    pub enabled: std::cell::Cell<bool>,
}

#[cfg(test)]
impl FakeSupervisor {
    fn record(&self, call: String) -> Result<(), ServiceError> {
        self.calls.borrow_mut().push(call);
        Ok(())
    }
}

#[cfg(test)]
impl Supervisor for FakeSupervisor {
    fn daemon_reload(&self) -> Result<(), ServiceError> {
        self.record("daemon-reload".to_string())
    }
    fn enable(&self, unit: &str) -> Result<(), ServiceError> {
        self.enabled.set(true);
        self.record(format!("enable {unit}"))
    }
    fn disable(&self, unit: &str) -> Result<(), ServiceError> {
        self.enabled.set(false);
        self.record(format!("disable {unit}"))
    }
    fn start(&self, unit: &str) -> Result<(), ServiceError> {
        self.active.set(true);
        self.record(format!("start {unit}"))
    }
    fn stop(&self, unit: &str) -> Result<(), ServiceError> {
        self.active.set(false);
        self.record(format!("stop {unit}"))
    }
    fn restart(&self, unit: &str) -> Result<(), ServiceError> {
        self.active.set(true);
        self.record(format!("restart {unit}"))
    }
    fn is_active(&self, _unit: &str) -> Result<bool, ServiceError> {
        Ok(self.active.get())
    }
    fn is_enabled(&self, _unit: &str) -> Result<bool, ServiceError> {
        Ok(self.enabled.get())
    }
    fn status(&self, unit: &str) -> Result<bool, ServiceError> {
        self.record(format!("status {unit}"))?;
        Ok(self.active.get())
    }
    fn follow_logs(&self, unit: &str) -> Result<(), ServiceError> {
        self.record(format!("logs {unit}"))
    }
}
