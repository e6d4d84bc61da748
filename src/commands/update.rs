//! `panelctl update`

use anyhow::Result;
use declarative::ExecuteOptions;

use super::Host;
use crate::Context;
use crate::engine::{Orchestrator, Reporter};
use crate::service::Systemd;
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    let host = Host::load(ctx)?;
    let systemd = Systemd::new(&host.runner);
    let orchestrator = Orchestrator::new(
        &host.layout,
        &host.settings,
        &host.runner,
        &systemd,
        &host.fetcher,
    );

    ui::header("Updating panel");
    ui::kv(
        "Source",
        &format!(
            "{}@{}",
            host.settings.source.repo, host.settings.source.git_ref
        ),
    );
    println!();

    let mut reporter = Reporter::new(ctx.quiet);
    let opts = ExecuteOptions {
        verbose: ctx.verbose > 0,
        ..Default::default()
    };
    let summary = orchestrator
        .update(&opts, &mut reporter)
        .map_err(|f| super::stopped(f, &host.layout))?;

    println!();
    ui::success(&format!(
        "Panel updated and restarted ({} changed)",
        summary.total_changes()
    ));
    Ok(())
}
