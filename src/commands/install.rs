//! `panelctl install`

use anyhow::Result;
use colored::Colorize;
use declarative::{ExecuteOptions, ResourceDiff, StepPolicy};

use super::Host;
use crate::Context;
use crate::engine::{Orchestrator, Reporter};
use crate::service::Systemd;
use crate::ui;

pub fn run(ctx: &Context, dry_run: bool) -> Result<()> {
    let host = Host::load(ctx)?;
    let systemd = Systemd::new(&host.runner);
    let orchestrator = Orchestrator::new(
        &host.layout,
        &host.settings,
        &host.runner,
        &systemd,
        &host.fetcher,
    );

    if dry_run {
        ui::header("Install Plan (dry run)");
        print_plan(&orchestrator.plan_install());
        return Ok(());
    }

    ui::header("Installing panel");
    ui::kv(
        "Source",
        &format!(
            "{}@{}",
            host.settings.source.repo, host.settings.source.git_ref
        ),
    );
    ui::kv("Workspace", &host.layout.workspace.display().to_string());
    println!();

    let mut reporter = Reporter::new(ctx.quiet);
    let opts = ExecuteOptions {
        verbose: ctx.verbose > 0,
        ..Default::default()
    };
    let outcome = orchestrator
        .install(&opts, &mut reporter)
        .map_err(|f| super::stopped(f, &host.layout))?;

    println!();
    ui::success(&format!(
        "Panel is running ({} changed, {} unchanged)",
        outcome.summary.total_changes(),
        outcome.summary.no_change
    ));
    if let Some(profile) = outcome.profile {
        ui::kv("Host", &profile.to_string());
    }
    if let Some(backup) = outcome.workspace.and_then(|w| w.backup_path) {
        ui::kv("Previous install", &backup.display().to_string());
    }
    ui::kv(
        "Listening on",
        &format!(
            "{}:{}",
            host.settings.server.bind_host, host.settings.server.bind_port
        ),
    );
    ui::kv(
        "Admin credentials",
        &host.layout.host_path(&host.layout.env_file).display().to_string(),
    );
    if !reporter.warnings().is_empty() {
        ui::warn(&format!(
            "Finished with {} warning(s)",
            reporter.warnings().len()
        ));
    }
    Ok(())
}

fn print_plan(diffs: &[ResourceDiff]) {
    let total = diffs.len();
    for (i, diff) in diffs.iter().enumerate() {
        let marker = if !diff.pending {
            "=".dimmed()
        } else if diff.is_addition() {
            "+".green()
        } else {
            "~".yellow()
        };
        let policy = match diff.policy {
            StepPolicy::Fatal => String::new(),
            StepPolicy::BestEffort => " (best effort)".dimmed().to_string(),
        };
        println!(
            "{} {} {}{}",
            format!("[{}/{}]", i + 1, total).blue().bold(),
            marker,
            diff.description,
            policy
        );
        println!(
            "      {} {}  {} {}",
            "now:".dimmed(),
            diff.current.label(),
            "want:".dimmed(),
            diff.desired.label()
        );
    }

    let pending = diffs.iter().filter(|d| d.pending).count();
    println!();
    if pending == 0 {
        ui::success("Nothing to do - host already matches");
    } else {
        ui::info(&format!("{pending} of {total} steps would change the host"));
    }
}
