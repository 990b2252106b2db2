mod cmd;
mod discover;
mod logging;
mod output;

use anyhow::Context;
use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::{Path, PathBuf};
use tracksync_core::config::Config;

#[derive(Parser)]
#[command(
    name = "tracksync",
    about = "Keep a Notion work log in step with Jira and report sprint progress per owner",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file (default: nearest tracksync.yaml from the current directory up)
    #[arg(long, global = true, env = "TRACKSYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the work log with the tracker
    Sync,

    /// List the active sprints of the tracked tickets
    Windows,

    /// Build per-owner sprint reports from the work log
    Report {
        /// Only this owner (default: every roster member)
        #[arg(long)]
        owner: Option<String>,

        /// Deliver the reports as Slack direct messages instead of printing
        #[arg(long)]
        send: bool,
    },

    /// Inspect the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();
    let config_path = discover::resolve_config(cli.config.as_deref());

    if let Err(e) = run(cli, &config_path) {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli, config_path: &Path) -> anyhow::Result<()> {
    let config = Config::load(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    let default_level = match &cli.command {
        Commands::Sync | Commands::Report { send: true, .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };
    let log_dir = config
        .logging
        .dir
        .as_deref()
        .map(|dir| discover::relative_to_config(config_path, dir));
    let _guard = logging::init(default_level, log_dir.as_deref())?;

    match cli.command {
        Commands::Sync => cmd::sync::run(&config, cli.json),
        Commands::Windows => cmd::windows::run(&config, cli.json),
        Commands::Report { owner, send } => cmd::report::run(&config, owner.as_deref(), send, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&config, subcommand, cli.json),
    }
}
