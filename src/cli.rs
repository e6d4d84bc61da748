use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "panelctl")]
#[command(version)]
#[command(about = "Install, update and remove the proxy panel service", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Settings file (default: /etc/panelctl/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Defaults to `install`
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Install the panel and start it as a service
    Install(InstallArgs),

    /// Fetch the latest source, migrate and restart
    Update,

    /// Stop the service and remove it with its workspace (data is kept)
    Uninstall,

    /// Show service status
    Status,

    /// Follow service logs
    Logs,

    /// Restart the service
    Restart,

    /// Install the proxy core binary
    #[command(disable_version_flag = true)]
    Core {
        /// Release tag (default: latest)
        #[arg(long, value_name = "TAG")]
        version: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Command {
    /// Name used in privilege errors; `None` for read-only commands
    pub fn mutating_action(&self) -> Option<&'static str> {
        match self {
            Self::Install(args) if args.dry_run => None,
            Self::Install(_) => Some("install"),
            Self::Update => Some("update"),
            Self::Uninstall => Some("uninstall"),
            Self::Restart => Some("restart"),
            Self::Core { .. } => Some("core"),
            Self::Status | Self::Logs | Self::Completions { .. } => None,
        }
    }
}

#[derive(Args, Default)]
pub struct InstallArgs {
    /// Show what each step would change without changing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}
