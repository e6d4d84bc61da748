mod cli;
mod commands;
mod config;
mod engine;
mod firewall;
mod migrate;
mod paths;
mod probe;
mod provision;
mod resource;
mod runner;
mod secrets;
mod service;
mod settings;
mod snapshot;
mod sudo;
mod ui;
mod workspace;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command, InstallArgs};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: cli.config,
    };
    let command = cli
        .command
        .unwrap_or_else(|| Command::Install(InstallArgs::default()));

    match dispatch(&ctx, command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ui::error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

fn dispatch(ctx: &Context, command: Command) -> Result<()> {
    if let Some(action) = command.mutating_action() {
        sudo::require_root(action)?;
    }

    match command {
        Command::Install(args) => commands::install::run(ctx, args.dry_run),
        Command::Update => commands::update::run(ctx),
        Command::Uninstall => commands::uninstall::run(ctx),
        Command::Status => commands::lifecycle::status(ctx),
        Command::Logs => commands::lifecycle::logs(ctx),
        Command::Restart => commands::lifecycle::restart(ctx),
        Command::Core { version } => commands::core_install::run(ctx, version.as_deref()),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "panelctl", &mut io::stdout());
            Ok(())
        }
    }
}
