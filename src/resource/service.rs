//! systemd and logrotate steps

use anyhow::Result;
use declarative::{ApplyContext, ApplyResult, Resource, ResourceState};
use std::fs;
use std::path::{Path, PathBuf};

use crate::service::{self, ServiceRegistrar, ServiceUnit, Supervisor};

fn file_state(path: &Path, content: &str) -> ResourceState {
    match fs::read_to_string(path) {
        Ok(current) if current == content => ResourceState::Present { details: None },
        Ok(_) => ResourceState::Modified {
            from: "outdated".to_string(),
            to: "current".to_string(),
        },
        Err(_) => ResourceState::Absent,
    }
}

/// The unit file, written through the registrar so it is marked stale
pub struct UnitFile<'a> {
    registrar: &'a ServiceRegistrar<'a>,
    unit: ServiceUnit,
    path: PathBuf,
    log_dir: Option<PathBuf>,
}

impl<'a> UnitFile<'a> {
    pub fn new(registrar: &'a ServiceRegistrar<'a>, unit: ServiceUnit, path: PathBuf) -> Self {
        Self {
            registrar,
            unit,
            path,
            log_dir: None,
        }
    }

    /// Directory the unit appends its output to; created alongside the unit
    pub fn with_log_dir(mut self, dir: PathBuf) -> Self {
        self.log_dir = Some(dir);
        self
    }
}

impl Resource for UnitFile<'_> {
    fn id(&self) -> String {
        self.unit.file_name()
    }

    fn description(&self) -> String {
        format!("Write {}", self.unit.file_name())
    }

    fn resource_type(&self) -> &'static str {
        "unit"
    }

    fn current_state(&self, _ctx: &ApplyContext) -> Result<ResourceState> {
        Ok(file_state(&self.path, &self.unit.to_string()))
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let existed = self.path.exists();
        if let Some(dir) = &self.log_dir {
            fs::create_dir_all(dir)?;
        }
        self.registrar.register(&self.unit, &self.path)?;
        Ok(if existed {
            ApplyResult::Modified
        } else {
            ApplyResult::Created
        })
    }
}

/// A plain managed file (the logrotate policy)
pub struct ManagedFile {
    id: String,
    path: PathBuf,
    content: String,
}

impl ManagedFile {
    pub fn new(id: &str, path: PathBuf, content: String) -> Self {
        Self {
            id: id.to_string(),
            path,
            content,
        }
    }
}

impl Resource for ManagedFile {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn description(&self) -> String {
        format!("Write {}", self.path.display())
    }

    fn resource_type(&self) -> &'static str {
        "file"
    }

    fn current_state(&self, _ctx: &ApplyContext) -> Result<ResourceState> {
        Ok(file_state(&self.path, &self.content))
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let existed = self.path.exists();
        service::write_file(&self.path, &self.content)?;
        Ok(if existed {
            ApplyResult::Modified
        } else {
            ApplyResult::Created
        })
    }
}

/// A managed file that must be gone
pub struct FileRemoval {
    id: String,
    path: PathBuf,
}

impl FileRemoval {
    pub fn new(id: &str, path: PathBuf) -> Self {
        Self {
            id: id.to_string(),
            path,
        }
    }
}

impl Resource for FileRemoval {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn description(&self) -> String {
        format!("Remove {}", self.path.display())
    }

    fn resource_type(&self) -> &'static str {
        "file"
    }

    fn current_state(&self, _ctx: &ApplyContext) -> Result<ResourceState> {
        Ok(if self.path.exists() {
            ResourceState::Present { details: None }
        } else {
            ResourceState::Absent
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Absent
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        Ok(if service::remove_file(&self.path)? {
            ApplyResult::Removed
        } else {
            ApplyResult::NoChange
        })
    }
}

/// systemd has loaded the current unit and will start it at boot
pub struct UnitEnabled<'a> {
    registrar: &'a ServiceRegistrar<'a>,
    name: String,
}

impl<'a> UnitEnabled<'a> {
    pub fn new(registrar: &'a ServiceRegistrar<'a>, name: &str) -> Self {
        Self {
            registrar,
            name: name.to_string(),
        }
    }
}

impl Resource for UnitEnabled<'_> {
    fn id(&self) -> String {
        format!("{}-enabled", self.name)
    }

    fn description(&self) -> String {
        format!("Reload systemd and enable {}", self.name)
    }

    fn resource_type(&self) -> &'static str {
        "systemd"
    }

    fn current_state(&self, _ctx: &ApplyContext) -> Result<ResourceState> {
        if self.registrar.is_stale(&self.name) {
            return Ok(ResourceState::Modified {
                from: "unit changed on disk".to_string(),
                to: "loaded".to_string(),
            });
        }
        Ok(if self.registrar.supervisor().is_enabled(&self.name)? {
            ResourceState::Present { details: None }
        } else {
            ResourceState::Absent
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    /// Always reload: a unit written by an interrupted earlier run matches
    /// on disk but may never have been loaded.
    fn needs_apply(&self, _ctx: &ApplyContext) -> Result<bool> {
        Ok(true)
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        self.registrar.reload(&self.name)?;
        Ok(ApplyResult::Modified)
    }
}

/// The service runs the code just deployed: restarted if running, else started
pub struct ServiceRunning<'a> {
    registrar: &'a ServiceRegistrar<'a>,
    name: String,
}

impl<'a> ServiceRunning<'a> {
    pub fn new(registrar: &'a ServiceRegistrar<'a>, name: &str) -> Self {
        Self {
            registrar,
            name: name.to_string(),
        }
    }
}

impl Resource for ServiceRunning<'_> {
    fn id(&self) -> String {
        format!("{}-running", self.name)
    }

    fn description(&self) -> String {
        format!("Start {}", self.name)
    }

    fn resource_type(&self) -> &'static str {
        "systemd"
    }

    fn current_state(&self, _ctx: &ApplyContext) -> Result<ResourceState> {
        Ok(if self.registrar.supervisor().is_active(&self.name)? {
            ResourceState::Present {
                details: Some("running".to_string()),
            }
        } else {
            ResourceState::Absent
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present {
            details: Some("running the deployed release".to_string()),
        }
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if self.registrar.supervisor().is_active(&self.name)? {
            self.registrar.restart(&self.name)?;
            Ok(ApplyResult::Modified)
        } else {
            self.registrar.start(&self.name)?;
            Ok(ApplyResult::Created)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    Stop,
    Disable,
    DaemonReload,
}

/// Stop, disable or reload during uninstall
pub struct ServiceTeardown<'a> {
    supervisor: &'a dyn Supervisor,
    name: String,
    action: Teardown,
}

impl<'a> ServiceTeardown<'a> {
    pub fn new(supervisor: &'a dyn Supervisor, name: &str, action: Teardown) -> Self {
        Self {
            supervisor,
            name: name.to_string(),
            action,
        }
    }
}

impl Resource for ServiceTeardown<'_> {
    fn id(&self) -> String {
        match self.action {
            Teardown::Stop => format!("{}-stopped", self.name),
            Teardown::Disable => format!("{}-disabled", self.name),
            Teardown::DaemonReload => "daemon-reload".to_string(),
        }
    }

    fn description(&self) -> String {
        match self.action {
            Teardown::Stop => format!("Stop {}", self.name),
            Teardown::Disable => format!("Disable {}", self.name),
            Teardown::DaemonReload => "Reload systemd".to_string(),
        }
    }

    fn resource_type(&self) -> &'static str {
        "systemd"
    }

    fn current_state(&self, _ctx: &ApplyContext) -> Result<ResourceState> {
        let present = match self.action {
            Teardown::Stop => self.supervisor.is_active(&self.name)?,
            Teardown::Disable => self.supervisor.is_enabled(&self.name)?,
            Teardown::DaemonReload => return Ok(ResourceState::Unknown),
        };
        Ok(if present {
            ResourceState::Present { details: None }
        } else {
            ResourceState::Absent
        })
    }

    fn desired_state(&self) -> ResourceState {
        match self.action {
            Teardown::DaemonReload => ResourceState::Present {
                details: Some("reloaded".to_string()),
            },
            _ => ResourceState::Absent,
        }
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        match self.action {
            Teardown::Stop => self.supervisor.stop(&self.name)?,
            Teardown::Disable => self.supervisor.disable(&self.name)?,
            Teardown::DaemonReload => self.supervisor.daemon_reload()?,
        }
        Ok(ApplyResult::Modified)
    }
}
