//! `panelctl status`, `logs` and `restart`
//!
//! These act on an existing installation only; without a unit file they
//! fail before touching systemd.

use anyhow::{Context as _, Result};
use std::fs;

use crate::Context;
use crate::paths::{Layout, SERVICE_NAME};
use crate::resource::SOURCE_MARKER;
use crate::runner::SystemRunner;
use crate::service::{self, Supervisor, Systemd};
use crate::ui;
use crate::workspace;

pub fn status(ctx: &Context) -> Result<()> {
    let layout = Layout::resolve();
    let runner = SystemRunner::new();
    show_status(ctx, &layout, &Systemd::new(&runner))
}

pub fn logs(_ctx: &Context) -> Result<()> {
    let layout = Layout::resolve();
    let runner = SystemRunner::new();
    follow_logs(&layout, &Systemd::new(&runner))
}

pub fn restart(ctx: &Context) -> Result<()> {
    let layout = Layout::resolve();
    let runner = SystemRunner::new();
    restart_service(&layout, &Systemd::new(&runner))?;
    if !ctx.quiet {
        ui::success(&format!("{SERVICE_NAME} restarted"));
    }
    Ok(())
}

fn show_status(ctx: &Context, layout: &Layout, supervisor: &dyn Supervisor) -> Result<()> {
    service::ensure_installed(layout)?;

    if !ctx.quiet {
        ui::header("Panel Status");
        let source = fs::read_to_string(layout.workspace.join(SOURCE_MARKER))
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        ui::kv("Source", &source);
        ui::kv(
            "Enabled",
            if supervisor.is_enabled(SERVICE_NAME)? {
                "yes"
            } else {
                "no"
            },
        );
        if let Ok(meta) = fs::metadata(&layout.database) {
            ui::kv(
                "Database",
                &format!(
                    "{} ({})",
                    layout.host_path(&layout.database).display(),
                    ui::format_size(meta.len())
                ),
            );
        }
        ui::kv(
            "Workspace backups",
            &workspace::list_backups(&layout.workspace).len().to_string(),
        );
        println!();
    }

    let running = supervisor
        .status(SERVICE_NAME)
        .context("Could not query the service")?;
    if !running {
        ui::warn(&format!("{SERVICE_NAME} is not running"));
    }
    Ok(())
}

fn follow_logs(layout: &Layout, supervisor: &dyn Supervisor) -> Result<()> {
    service::ensure_installed(layout)?;
    supervisor.follow_logs(SERVICE_NAME)?;
    Ok(())
}

fn restart_service(layout: &Layout, supervisor: &dyn Supervisor) -> Result<()> {
    service::ensure_installed(layout)?;
    supervisor.restart(SERVICE_NAME)?;
    Ok(())
}
