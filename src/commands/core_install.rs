//! `panelctl core`: install the proxy core binary
//!
//! Standalone from `install`. The release asset for this machine is
//! unpacked into the core directory the env file points at.

use anyhow::{Context as _, Result, bail};
use artifact::{Arch, Fetcher, ReleaseArtifact};
use declarative::{Invocation, Runner};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use super::Host;
use crate::Context;
use crate::paths::Layout;
use crate::probe::UnsupportedHost;
use crate::settings::Settings;
use crate::ui;

const CORE_BINARY: &str = "xray";

#[derive(Debug)]
pub struct CoreInstall {
    pub version: String,
    pub arch: Arch,
    pub files: usize,
    pub executable: PathBuf,
}

pub fn run(ctx: &Context, version: Option<&str>) -> Result<()> {
    let host = Host::load(ctx)?;

    let spinner = (!ctx.quiet).then(|| ui::spinner("Installing core..."));
    let result = install_core(
        &host.layout,
        &host.settings,
        &host.runner,
        &host.fetcher,
        version,
    );
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let core = result?;

    ui::success(&format!(
        "Core {} ({}) installed, {} files",
        core.version,
        core.arch.machine(),
        core.files
    ));
    ui::kv(
        "Executable",
        &host.layout.host_path(&core.executable).display().to_string(),
    );
    Ok(())
}

/// Resolve, download and unpack the core, then mark the binary executable.
///
/// `requested` wins over `core.version` from settings; with neither, the
/// latest release is used.
pub fn install_core(
    layout: &Layout,
    settings: &Settings,
    runner: &dyn Runner,
    fetcher: &Fetcher,
    requested: Option<&str>,
) -> Result<CoreInstall> {
    let machine = runner
        .run_capture(&Invocation::new("uname").arg("-m"))
        .map_err(|e| UnsupportedHost::ArchitectureUnknown(format!("{e:#}")))?;
    let arch =
        Arch::from_machine(&machine).map_err(|_| UnsupportedHost::Architecture(machine.clone()))?;

    let requested = requested.or(settings.core.version.as_deref());
    let version = fetcher.resolve_version(&settings.core.repo, requested)?;
    log::info!("Installing core {} for {}", version, arch.machine());

    fs::create_dir_all(&layout.core_dir)
        .with_context(|| format!("Could not create {}", layout.core_dir.display()))?;
    let artifact = ReleaseArtifact::core(&settings.core.repo, &version, arch, &layout.staging_dir);
    let files = fetcher.install(&artifact, &layout.core_dir)?;

    let executable = layout.core_dir.join(CORE_BINARY);
    if !executable.is_file() {
        bail!("core release {version} has no `{CORE_BINARY}` binary");
    }
    let mut perms = fs::metadata(&executable)
        .with_context(|| format!("Could not stat {}", executable.display()))?
        .permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&executable, perms)
        .with_context(|| format!("Could not mark {} executable", executable.display()))?;

    Ok(CoreInstall {
        version,
        arch,
        files,
        executable,
    })
}
