//! Library interface for the `herald` CLI.
//!
//! The argument parser lives here so `xtask` can generate man pages and
//! shell completions from it; `main.rs` only wires configuration, logging,
//! and the selected subcommand together.

pub mod commands;

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

/// When to colorize terminal output.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum ColorChoice {
    /// Colorize when the terminal supports it.
    #[default]
    Auto,
    /// Always colorize.
    Always,
    /// Never colorize.
    Never,
}

impl ColorChoice {
    /// Set the process-wide color override.
    pub fn apply(self) {
        match self {
            Self::Auto => {}
            Self::Always => owo_colors::set_override(true),
            Self::Never => owo_colors::set_override(false),
        }
    }
}

const ENV_HELP: &str = "\
ENVIRONMENT VARIABLES:
    SLACK_WEBHOOK_URL       Slack incoming webhook (announce)
    GITHUB_TOKEN            Token for the github changelog source
    GITHUB_REPOSITORY       owner/name for the github changelog source
    RUST_LOG                Log filter (e.g., debug, herald_core=trace)
    HERALD_LOG_PATH         Explicit log file path
    HERALD_LOG_DIR          Log directory
";

/// Command-line interface for herald.
#[derive(Parser)]
#[command(name = "herald")]
#[command(about = "Announce changelog releases to Slack", long_about = None)]
#[command(version)]
#[command(after_long_help = ENV_HELP)]
pub struct Cli {
    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file (merged over discovered files)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Run as if started in DIR
    #[arg(short = 'C', long, global = true)]
    pub chdir: Option<PathBuf>,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// More detail (repeatable; e.g. -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Colorize output
    #[arg(long, global = true, value_enum, default_value_t)]
    pub color: ColorChoice,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,
}

/// Subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Post the latest release notes to Slack
    Announce(commands::announce::AnnounceArgs),

    /// Show the message that would be posted, without posting it
    Preview(commands::preview::PreviewArgs),

    /// Show package and resolved configuration
    Info(commands::info::InfoArgs),

    /// Diagnose configuration and environment
    Doctor(commands::doctor::DoctorArgs),
}

/// The clap command, for documentation generation.
pub fn command() -> clap::Command {
    Cli::command()
}
