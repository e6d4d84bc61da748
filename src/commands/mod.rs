//! Subcommand implementations

pub mod core_install;
pub mod install;
pub mod lifecycle;
pub mod uninstall;
pub mod update;

use anyhow::Result;
use artifact::Fetcher;

use crate::Context;
use crate::engine::StageFailure;
use crate::paths::Layout;
use crate::runner::SystemRunner;
use crate::settings::Settings;
use crate::ui;

/// Everything a deployment command works against on this host
pub struct Host {
    pub layout: Layout,
    pub settings: Settings,
    pub runner: SystemRunner,
    pub fetcher: Fetcher,
}

impl Host {
    pub fn load(ctx: &Context) -> Result<Self> {
        let layout = Layout::resolve();
        let settings = Settings::load(ctx.config.as_deref(), &layout)?;
        Ok(Self {
            layout,
            settings,
            runner: SystemRunner::new(),
            fetcher: Fetcher::new(),
        })
    }
}

/// Explain what a stopped run left behind, then hand the failure back
pub(crate) fn stopped(failure: StageFailure, layout: &Layout) -> anyhow::Error {
    ui::dim(&format!(
        "Nothing was rolled back. Re-run after fixing the cause; backups live next to {}",
        layout.workspace.display()
    ));
    failure.into()
}
