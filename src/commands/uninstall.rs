//! `panelctl uninstall`

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

    ui::header("Uninstalling panel");
    println!();

    let mut reporter = Reporter::new(ctx.quiet);
    let opts = ExecuteOptions {
        verbose: ctx.verbose > 0,
        ..Default::default()
    };
    orchestrator
        .uninstall(&opts, &mut reporter)
        .map_err(anyhow::Error::from)?;

    println!();
    ui::success("Panel removed");
    ui::dim(&format!(
        "Data kept in {}",
        host.layout.host_path(&host.layout.data_dir).display()
    ));
    Ok(())
}
