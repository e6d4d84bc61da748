//! The deployment state machine
//!
//! Install, update and uninstall are step tables run by
//! [`declarative::execute`]. A fatal step failure stops the run where it
//! is; there is no rollback.

use artifact::Fetcher;
use chrono::{DateTime, Local};
use declarative::{
    ApplyContext, ExecuteOptions, ExecuteSummary, Pipeline, ResourceDiff, Runner, compute_diffs,
};
use std::cell::OnceCell;

use super::report::Reporter;
use super::stage::{Stage, StageFailure};
use crate::paths::{Layout, SERVICE_NAME};
use crate::probe::HostProfile;
use crate::resource::{
    DatabaseBackup, EnvFile, FileRemoval, FirewallPorts, FreshWorkspace, HostProbe, ManagedFile,
    PythonRuntime, SchemaMigration, ServiceRunning, ServiceTeardown, SourceRelease, SystemPackages,
    Teardown, UnitEnabled, UnitFile, WorkspaceRemoval,
};
use crate::runner;
use crate::service::{self, LogRotatePolicy, ServiceRegistrar, ServiceUnit, Supervisor};
use crate::settings::Settings;
use crate::workspace::InstallationWorkspace;

/// Facts install steps hand to later steps
#[derive(Default)]
struct InstallState {
    profile: OnceCell<HostProfile>,
    workspace: OnceCell<InstallationWorkspace>,
}

/// What a successful install found and did
#[derive(Debug)]
pub struct InstallOutcome {
    pub summary: ExecuteSummary,
    pub profile: Option<HostProfile>,
    pub workspace: Option<InstallationWorkspace>,
}

pub struct Orchestrator<'a> {
    layout: &'a Layout,
    settings: &'a Settings,
    runner: &'a dyn Runner,
    supervisor: &'a dyn Supervisor,
    fetcher: &'a Fetcher,
    clock: fn() -> DateTime<Local>,
    firewall_available: fn(&str) -> bool,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        layout: &'a Layout,
        settings: &'a Settings,
        runner: &'a dyn Runner,
        supervisor: &'a dyn Supervisor,
        fetcher: &'a Fetcher,
    ) -> Self {
        Self {
            layout,
            settings,
            runner,
            supervisor,
            fetcher,
            clock: Local::now,
            firewall_available: runner::command_exists,
        }
    }

    /// Source of timestamps for backup names
    pub fn with_clock(mut self, clock: fn() -> DateTime<Local>) -> Self {
        self.clock = clock;
        self
    }

    /// How the firewall step finds `ufw` / `firewall-cmd`
    pub fn with_firewall_detection(mut self, detect: fn(&str) -> bool) -> Self {
        self.firewall_available = detect;
        self
    }

    fn install_pipeline<'p>(
        &'p self,
        state: &'p InstallState,
        registrar: &'p ServiceRegistrar<'p>,
    ) -> Pipeline<'p, Stage> {
        let layout = self.layout;
        let settings = self.settings;
        let unit = ServiceUnit::panel(layout, settings);

        let mut pipeline = Pipeline::new();
        pipeline
            .fatal(Stage::Probing, HostProbe::new(&layout.root, &state.profile))
            .fatal(Stage::Provisioning, SystemPackages::new(&state.profile))
            .fatal(
                Stage::WorkspaceReady,
                FreshWorkspace::new(&layout.workspace, self.clock, &state.workspace),
            )
            .fatal(
                Stage::Fetched,
                SourceRelease::new(
                    self.fetcher,
                    &settings.source.repo,
                    &settings.source.git_ref,
                    &layout.workspace,
                    &layout.staging_dir,
                ),
            )
            .fatal(Stage::Fetched, PythonRuntime::new(layout))
            .fatal(Stage::Configured, EnvFile::new(layout, settings))
            .fatal(
                Stage::Migrated,
                SchemaMigration::new(layout, settings.migration.timeout()),
            )
            .fatal(
                Stage::ServiceRegistered,
                UnitFile::new(registrar, unit, layout.unit_file.clone())
                    .with_log_dir(layout.log_dir.clone()),
            )
            .fatal(
                Stage::ServiceRegistered,
                ManagedFile::new(
                    "logrotate",
                    layout.logrotate_file.clone(),
                    LogRotatePolicy::panel(layout).to_string(),
                ),
            )
            .fatal(
                Stage::ServiceRegistered,
                UnitEnabled::new(registrar, SERVICE_NAME),
            );

        if settings.firewall.enabled {
            pipeline.best_effort(
                Stage::ServiceRegistered,
                FirewallPorts::new(settings.firewall_ports(), self.firewall_available),
            );
        }

        pipeline.fatal(Stage::Started, ServiceRunning::new(registrar, SERVICE_NAME));
        pipeline
    }

    /// Run the install step table through to `Started`
    pub fn install(
        &self,
        opts: &ExecuteOptions,
        reporter: &mut Reporter,
    ) -> Result<InstallOutcome, StageFailure> {
        let state = InstallState::default();
        let registrar = ServiceRegistrar::new(self.supervisor);
        let pipeline = self.install_pipeline(&state, &registrar);

        let summary = declarative::execute(&pipeline, opts, self.runner, reporter)?;
        Ok(InstallOutcome {
            summary,
            profile: state.profile.get().copied(),
            workspace: state.workspace.get().cloned(),
        })
    }

    /// Observe every install step without changing anything
    pub fn plan_install(&self) -> Vec<ResourceDiff> {
        let state = InstallState::default();
        let registrar = ServiceRegistrar::new(self.supervisor);
        let pipeline = self.install_pipeline(&state, &registrar);
        let ctx = ApplyContext::new(true, false, self.runner);
        compute_diffs(&pipeline, &ctx)
    }

    /// Snapshot, fetch over the workspace, reinstall dependencies, migrate, restart.
    ///
    /// Host packages, the workspace directory and the env file are left alone.
    pub fn update(
        &self,
        opts: &ExecuteOptions,
        reporter: &mut Reporter,
    ) -> Result<ExecuteSummary, StageFailure> {
        service::ensure_installed(self.layout)
            .map_err(|e| StageFailure::new(Stage::Idle, "Check installation", e))?;

        let layout = self.layout;
        let settings = self.settings;
        let registrar = ServiceRegistrar::new(self.supervisor);

        let mut pipeline = Pipeline::new();
        pipeline
            .fatal(Stage::Snapshotted, DatabaseBackup::new(layout, self.clock))
            .fatal(
                Stage::Fetched,
                SourceRelease::new(
                    self.fetcher,
                    &settings.source.repo,
                    &settings.source.git_ref,
                    &layout.workspace,
                    &layout.staging_dir,
                )
                .refresh(),
            )
            .fatal(Stage::Fetched, PythonRuntime::new(layout))
            .fatal(
                Stage::Migrated,
                SchemaMigration::new(layout, settings.migration.timeout()),
            )
            .fatal(Stage::Started, ServiceRunning::new(&registrar, SERVICE_NAME));

        Ok(declarative::execute(&pipeline, opts, self.runner, reporter)?)
    }

    /// Stop and remove the service and workspace. The data directory is kept.
    pub fn uninstall(
        &self,
        opts: &ExecuteOptions,
        reporter: &mut Reporter,
    ) -> Result<ExecuteSummary, StageFailure> {
        let layout = self.layout;
        let supervisor = self.supervisor;

        let mut pipeline = Pipeline::new();
        pipeline
            .best_effort(
                Stage::Stopped,
                ServiceTeardown::new(supervisor, SERVICE_NAME, Teardown::Stop),
            )
            .best_effort(
                Stage::Stopped,
                ServiceTeardown::new(supervisor, SERVICE_NAME, Teardown::Disable),
            )
            .fatal(
                Stage::Removed,
                FileRemoval::new("unit", layout.unit_file.clone()),
            )
            .fatal(
                Stage::Removed,
                FileRemoval::new("logrotate", layout.logrotate_file.clone()),
            )
            .best_effort(
                Stage::Removed,
                ServiceTeardown::new(supervisor, SERVICE_NAME, Teardown::DaemonReload),
            )
            .fatal(Stage::Removed, WorkspaceRemoval::new(&layout.workspace));

        Ok(declarative::execute(&pipeline, opts, self.runner, reporter)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use crate::migrate::MigrationError;
    use crate::probe::UnsupportedHost;
    use crate::resource::SOURCE_MARKER;
    use crate::service::{ServiceError, Systemd};
    use crate::workspace;
    use artifact::{MockBackend, source_archive_url};
    use chrono::TimeZone;
    use declarative::{CommandOutput, MockRunner};
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn first_run() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2026, 2, 10, 8, 0, 0)
            .single()
            .unwrap()
    }

    fn second_run() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2026, 2, 10, 8, 5, 0)
            .single()
            .unwrap()
    }

    fn no_firewall(_: &str) -> bool {
        false
    }

    fn source_tarball() -> Vec<u8> {
        let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, body) in [
            ("Marzban-master/main.py", "print('panel')\n"),
            ("Marzban-master/requirements.txt", "fastapi\nuvicorn\n"),
            ("Marzban-master/app/__init__.py", ""),
        ] {
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o644);
            builder.append_data(&mut header, name, body.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    /// A Debian host under a temp root with the source tarball on offer
    struct Host {
        root: TempDir,
        layout: Layout,
        settings: Settings,
        runner: MockRunner,
        fetcher: Fetcher,
        backend: MockBackend,
    }

    impl Host {
        fn new(machine: &str) -> Self {
            let root = TempDir::new().unwrap();
            fs::create_dir_all(root.path().join("etc")).unwrap();
            fs::write(root.path().join("etc/debian_version"), "12.5\n").unwrap();

            let settings = Settings::default();
            let mut backend = MockBackend::new();
            backend.add_asset(
                source_archive_url(&settings.source.repo, &settings.source.git_ref),
                source_tarball(),
            );

            let runner = MockRunner::new();
            runner
                .respond("uname -m", CommandOutput::ok(format!("{machine}\n")))
                .fail("systemctl is-active", "inactive")
                .fail("systemctl is-enabled", "disabled");

            Self {
                layout: Layout::from_root(root.path()),
                root,
                settings,
                runner,
                fetcher: Fetcher::with_backend(Box::new(backend.clone())),
                backend,
            }
        }

        fn install(
            &self,
            clock: fn() -> DateTime<Local>,
        ) -> (Result<InstallOutcome, StageFailure>, Reporter) {
            let systemd = Systemd::new(&self.runner);
            let orchestrator = Orchestrator::new(
                &self.layout,
                &self.settings,
                &self.runner,
                &systemd,
                &self.fetcher,
            )
            .with_clock(clock)
            .with_firewall_detection(no_firewall);
            let mut reporter = Reporter::new(true);
            let result = orchestrator.install(&ExecuteOptions::default(), &mut reporter);
            (result, reporter)
        }

        fn orchestrator<'a>(&'a self, systemd: &'a Systemd<'a>) -> Orchestrator<'a> {
            Orchestrator::new(
                &self.layout,
                &self.settings,
                &self.runner,
                systemd,
                &self.fetcher,
            )
            .with_clock(second_run)
            .with_firewall_detection(no_firewall)
        }

        fn count(&self, prefix: &str) -> usize {
            self.runner
                .command_lines()
                .iter()
                .filter(|line| line.starts_with(prefix))
                .count()
        }
    }

    fn tree(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        fn walk(base: &Path, dir: &Path, out: &mut BTreeMap<PathBuf, Vec<u8>>) {
            for entry in fs::read_dir(dir).unwrap() {
                let path = entry.unwrap().path();
                let rel = path.strip_prefix(base).unwrap().to_path_buf();
                if path.is_dir() {
                    out.insert(rel, Vec::new());
                    walk(base, &path, out);
                } else {
                    out.insert(rel, fs::read(&path).unwrap());
                }
            }
        }
        let mut out = BTreeMap::new();
        walk(dir, dir, &mut out);
        out
    }

    #[test]
    fn test_install_fresh_host_reaches_started() {
        let host = Host::new("x86_64");

        let (result, reporter) = host.install(first_run);
        let outcome = result.unwrap();

        assert_eq!(
            reporter.history(),
            &[
                Stage::Idle,
                Stage::Probing,
                Stage::Provisioning,
                Stage::WorkspaceReady,
                Stage::Fetched,
                Stage::Configured,
                Stage::Migrated,
                Stage::ServiceRegistered,
                Stage::Started,
            ]
        );
        assert_eq!(outcome.profile.unwrap().arch.token(), "64");
        assert!(!outcome.workspace.unwrap().existed);

        let layout = &host.layout;
        assert!(layout.workspace.join("main.py").is_file());
        assert!(layout.workspace.join("app/__init__.py").is_file());
        assert!(layout.workspace.join(SOURCE_MARKER).is_file());

        let env = config::read(&layout.env_file).unwrap();
        assert_eq!(
            env["SQLALCHEMY_DATABASE_URL"],
            "sqlite:////var/lib/panel/db.sqlite3"
        );
        let password = &env["SUDO_PASSWORD"];
        assert_eq!(password.len(), 12);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));

        assert!(layout.unit_file.is_file());
        assert!(layout.logrotate_file.is_file());
        assert!(layout.log_dir.is_dir());
        assert!(layout.data_dir.is_dir());
        assert_eq!(host.count("systemctl enable panel"), 1);
        assert_eq!(host.count("systemctl start panel"), 1);
        let reload = host.runner.position("systemctl daemon-reload").unwrap();
        let start = host.runner.position("systemctl start panel").unwrap();
        assert!(reload < start);

        // The staged archive never outlives the run
        let staged = fs::read_dir(&layout.staging_dir).map_or(0, |d| d.count());
        assert_eq!(staged, 0);
        assert_eq!(host.backend.downloads().len(), 1);

        // No firewall on this host: a warning, not a failure
        assert_eq!(reporter.warnings().len(), 1);
        assert_eq!(outcome.summary.warnings, 1);
    }

    #[test]
    fn test_install_unsupported_arch_fails_at_probing_without_mutation() {
        let host = Host::new("mips");
        let before = tree(host.root.path());

        let (result, reporter) = host.install(first_run);
        let failure = result.unwrap_err();

        assert_eq!(failure.stage, Stage::Probing);
        assert!(matches!(
            failure.cause::<UnsupportedHost>(),
            Some(UnsupportedHost::Architecture(m)) if m == "mips"
        ));
        assert_eq!(
            reporter.history(),
            &[Stage::Idle, Stage::Probing, Stage::Failed]
        );
        assert_eq!(host.runner.command_lines(), vec!["uname -m"]);
        assert_eq!(tree(host.root.path()), before);
        assert!(host.backend.downloads().is_empty());
    }

    #[test]
    fn test_install_over_existing_workspace_backs_it_up() {
        let host = Host::new("x86_64");
        let layout = &host.layout;
        fs::create_dir_all(layout.workspace.join("app/templates")).unwrap();
        fs::write(layout.workspace.join("main.py"), "old release\n").unwrap();
        fs::write(layout.workspace.join("app/templates/home.html"), "<p/>").unwrap();
        fs::write(&layout.env_file, "JWT_SECRET_KEY = \"previous\"\n").unwrap();
        let before = tree(&layout.workspace);

        let (result, _) = host.install(first_run);
        result.unwrap();

        let backup = workspace::backup_path(&layout.workspace, first_run());
        assert_eq!(tree(&backup), before);
        assert_eq!(workspace::list_backups(&layout.workspace), vec![backup]);

        assert_eq!(
            fs::read_to_string(layout.workspace.join("main.py")).unwrap(),
            "print('panel')\n"
        );
        assert!(!layout.workspace.join("app/templates").exists());
        // The old secrets survive the reinstall
        let env = config::read(&layout.env_file).unwrap();
        assert_eq!(env["JWT_SECRET_KEY"], "previous");
    }

    #[test]
    fn test_install_migration_timeout_never_registers_service() {
        let host = Host::new("x86_64");
        let alembic = host.layout.venv_bin("alembic").display().to_string();
        host.runner.respond(&alembic, CommandOutput::timeout());

        let (result, reporter) = host.install(first_run);
        let failure = result.unwrap_err();

        assert_eq!(failure.stage, Stage::Migrated);
        assert!(matches!(
            failure.cause::<MigrationError>(),
            Some(MigrationError::Timeout(300))
        ));
        assert_eq!(reporter.stage(), Stage::Failed);
        assert!(!host.layout.unit_file.exists());
        assert!(!host.runner.was_called("systemctl"));
        let upgrade = host
            .runner
            .calls()
            .into_iter()
            .find(|c| c.program == alembic)
            .unwrap();
        assert_eq!(upgrade.timeout, Some(std::time::Duration::from_secs(300)));
    }

    #[test]
    fn test_second_install_converges() {
        let host = Host::new("x86_64");
        host.install(first_run).0.unwrap();
        let env_before = fs::read_to_string(&host.layout.env_file).unwrap();
        host.runner
            .respond("systemctl is-enabled", CommandOutput::ok("enabled\n"))
            .respond("systemctl is-active", CommandOutput::ok("active\n"));

        let (result, _) = host.install(second_run);
        let outcome = result.unwrap();

        assert_eq!(workspace::list_backups(&host.layout.workspace).len(), 1);
        assert!(outcome.workspace.unwrap().existed);
        assert_eq!(
            fs::read_to_string(&host.layout.env_file).unwrap(),
            env_before
        );
        // Same unit on disk: reloaded again anyway, then the running service is restarted
        assert_eq!(host.count("systemctl daemon-reload"), 2);
        assert_eq!(host.count("systemctl restart panel"), 1);
        assert_eq!(host.count("apt-get install"), 0);
    }

    #[test]
    fn test_install_reloads_unit_left_by_interrupted_run() {
        let host = Host::new("x86_64");
        let unit = ServiceUnit::panel(&host.layout, &host.settings);
        service::write_file(&host.layout.unit_file, &unit.to_string()).unwrap();
        host.runner
            .respond("systemctl is-enabled", CommandOutput::ok("enabled\n"))
            .respond("systemctl is-active", CommandOutput::ok("active\n"));

        let (result, _) = host.install(first_run);
        result.unwrap();

        let reload = host.runner.position("systemctl daemon-reload").unwrap();
        let restart = host.runner.position("systemctl restart panel").unwrap();
        assert!(reload < restart);
        assert_eq!(host.count("systemctl enable panel"), 1);
    }

    #[test]
    fn test_update_snapshots_and_restarts() {
        let host = Host::new("x86_64");
        host.install(first_run).0.unwrap();
        let conn = rusqlite::Connection::open(&host.layout.database).unwrap();
        conn.execute_batch("CREATE TABLE admins (username TEXT);").unwrap();
        drop(conn);
        let env_before = fs::read_to_string(&host.layout.env_file).unwrap();
        let calls_before = host.runner.calls().len();
        host.runner
            .respond("systemctl is-active", CommandOutput::ok("active\n"));

        let systemd = Systemd::new(&host.runner);
        let mut reporter = Reporter::new(true);
        host.orchestrator(&systemd)
            .update(&ExecuteOptions::default(), &mut reporter)
            .unwrap();

        assert_eq!(
            reporter.history(),
            &[
                Stage::Idle,
                Stage::Snapshotted,
                Stage::Fetched,
                Stage::Migrated,
                Stage::Started,
            ]
        );
        let snapshot = crate::snapshot::snapshot_path(&host.layout.database, second_run());
        assert!(snapshot.is_file());
        assert_eq!(
            fs::read_to_string(&host.layout.env_file).unwrap(),
            env_before
        );
        assert_eq!(host.backend.downloads().len(), 2);

        let update_calls: Vec<String> = host.runner.command_lines()[calls_before..].to_vec();
        assert!(!update_calls.iter().any(|c| c.starts_with("dpkg")));
        assert!(!update_calls.iter().any(|c| c.starts_with("uname")));
        assert!(update_calls.iter().any(|c| c == "systemctl restart panel"));
    }

    #[test]
    fn test_update_requires_installation() {
        let host = Host::new("x86_64");
        let systemd = Systemd::new(&host.runner);
        let mut reporter = Reporter::new(true);

        let failure = host
            .orchestrator(&systemd)
            .update(&ExecuteOptions::default(), &mut reporter)
            .unwrap_err();

        assert_eq!(failure.stage, Stage::Idle);
        assert!(matches!(
            failure.cause::<ServiceError>(),
            Some(ServiceError::NotInstalled(_))
        ));
        assert!(host.runner.calls().is_empty());
    }

    #[test]
    fn test_uninstall_keeps_data() {
        let host = Host::new("x86_64");
        host.install(first_run).0.unwrap();
        host.runner
            .respond("systemctl is-active", CommandOutput::ok("active\n"))
            .respond("systemctl is-enabled", CommandOutput::ok("enabled\n"))
            .fail("systemctl stop", "Job for panel.service canceled");

        let systemd = Systemd::new(&host.runner);
        let mut reporter = Reporter::new(true);
        let summary = host
            .orchestrator(&systemd)
            .uninstall(&ExecuteOptions::default(), &mut reporter)
            .unwrap();

        assert_eq!(summary.warnings, 1);
        assert!(host.runner.was_called("systemctl disable panel"));
        assert!(!host.layout.unit_file.exists());
        assert!(!host.layout.logrotate_file.exists());
        assert!(!host.layout.workspace.exists());
        assert!(host.layout.data_dir.is_dir());
        let disable = host.runner.position("systemctl disable panel").unwrap();
        let reload = host
            .runner
            .command_lines()
            .iter()
            .rposition(|c| c == "systemctl daemon-reload")
            .unwrap();
        assert!(disable < reload);
    }

    #[test]
    fn test_plan_install_mutates_nothing() {
        let host = Host::new("x86_64");
        let before = tree(host.root.path());
        let systemd = Systemd::new(&host.runner);

        let diffs = host.orchestrator(&systemd).plan_install();

        let ids: Vec<&str> = diffs.iter().map(|d| d.resource_id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "host",
                "packages",
                "workspace",
                "source",
                "python",
                "config",
                "migrations",
                "panel.service",
                "logrotate",
                "panel-enabled",
                "firewall",
                "panel-running",
            ]
        );
        let pending = |id: &str| diffs.iter().find(|d| d.resource_id == id).unwrap().pending;
        assert!(!pending("host"));
        assert!(pending("workspace"));
        assert!(pending("source"));
        assert!(pending("panel.service"));
        assert_eq!(tree(host.root.path()), before);
        assert!(host.backend.downloads().is_empty());
        assert!(!host.runner.was_called("apt-get"));
    }
}
