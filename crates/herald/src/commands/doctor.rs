//! Doctor command: check the environment herald depends on.

use std::io::IsTerminal;
use std::time::Duration;

use camino::Utf8Path;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Confirm;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use herald_core::config::{self, Config};
use herald_core::git;

/// Arguments for the `doctor` subcommand.
#[derive(Args, Debug, Default)]
pub struct DoctorArgs {}

#[derive(Serialize)]
struct DoctorReport {
    config: ConfigStatus,
    directories: DirectoryPaths,
    git: GitStatus,
    environment: Vec<EnvVar>,
}

#[derive(Serialize)]
struct ConfigStatus {
    file: Option<String>,
    found: bool,
}

#[derive(Serialize)]
struct DirectoryPaths {
    config: Option<String>,
    data: Option<String>,
    data_local: Option<String>,
}

#[derive(Serialize)]
struct GitStatus {
    /// `git` executable on PATH.
    executable: Option<String>,
    /// Working directory is inside a repository.
    in_repository: bool,
}

#[derive(Serialize)]
struct EnvVar {
    name: &'static str,
    /// Secret values are reported only as `"<set>"`.
    value: Option<String>,
    description: &'static str,
}

impl EnvVar {
    fn read(name: &'static str, description: &'static str, secret: bool) -> Self {
        let value = std::env::var(name)
            .ok()
            .map(|v| if secret { "<set>".to_string() } else { v });
        Self {
            name,
            value,
            description,
        }
    }
}

impl DoctorReport {
    fn gather(cwd: &Utf8Path) -> Self {
        let config_file = config::find_project_config(cwd);
        let executable = which::which("git")
            .ok()
            .map(|p| p.display().to_string());
        let in_repository = executable.is_some() && git::is_inside_repo(cwd).unwrap_or(false);

        Self {
            config: ConfigStatus {
                found: config_file.is_some(),
                file: config_file.map(|p| p.to_string()),
            },
            directories: DirectoryPaths {
                config: config::user_config_dir().map(|p| p.to_string()),
                data: config::user_data_dir().map(|p| p.to_string()),
                data_local: config::user_data_local_dir().map(|p| p.to_string()),
            },
            git: GitStatus {
                executable,
                in_repository,
            },
            environment: vec![
                EnvVar::read("SLACK_WEBHOOK_URL", "Slack incoming webhook", true),
                EnvVar::read("GITHUB_TOKEN", "Token for the github source", true),
                EnvVar::read("GITHUB_REPOSITORY", "Repository for the github source", false),
                EnvVar::read("RUST_LOG", "Log filter directive", false),
                EnvVar::read("HERALD_LOG_PATH", "Explicit log file path", false),
                EnvVar::read("HERALD_LOG_DIR", "Log directory", false),
            ],
        }
    }
}

/// Run diagnostics and report what was found.
#[instrument(name = "cmd_doctor", skip_all)]
pub fn cmd_doctor(_args: DoctorArgs, global_json: bool, cwd: &Utf8Path) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing doctor command");

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.cyan} {msg}")?);
    spinner.set_message("Gathering diagnostics...");
    spinner.enable_steady_tick(Duration::from_millis(80));
    let report = DoctorReport::gather(cwd);
    spinner.finish_and_clear();

    if global_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "Configuration".bold().underline());
    match &report.config.file {
        Some(file) => println!("  {} Config file: {}", "✓".green(), file.cyan()),
        None => {
            println!("  {} No config file found", "○".yellow());
            offer_config_creation()?;
        }
    }
    println!();

    println!("{}", "Git".bold().underline());
    match &report.git.executable {
        Some(path) => println!("  {} git: {}", "✓".green(), path.cyan()),
        None => println!("  {} git not found on PATH", "✗".red()),
    }
    if report.git.in_repository {
        println!("  {} Inside a git repository", "✓".green());
    } else {
        println!(
            "  {} Not inside a git repository (the file source needs one)",
            "○".yellow()
        );
    }
    println!();

    println!("{}", "Directories".bold().underline());
    print_dir("  Config", report.directories.config.as_deref());
    print_dir("  Data", report.directories.data.as_deref());
    print_dir("  Data (local)", report.directories.data_local.as_deref());
    println!();

    println!("{}", "Environment".bold().underline());
    println!("  {}: {}", "Working directory".dimmed(), cwd.cyan());
    for var in &report.environment {
        match &var.value {
            Some(value) => println!("  {}: {}", var.name.dimmed(), value.cyan()),
            None => println!(
                "  {}: {} ({})",
                var.name.dimmed(),
                "unset".yellow(),
                var.description
            ),
        }
    }

    Ok(())
}

fn print_dir(label: &str, path: Option<&str>) {
    match path {
        Some(p) => println!("{}: {}", label.dimmed(), p.cyan()),
        None => println!("{}: {}", label.dimmed(), "(unavailable)".yellow()),
    }
}

/// Offer to write a default user config when running interactively.
fn offer_config_creation() -> anyhow::Result<()> {
    if !std::io::stdin().is_terminal() {
        return Ok(());
    }
    let Some(dir) = config::user_config_dir() else {
        return Ok(());
    };
    let path = dir.join("config.yaml");

    let confirmed = Confirm::new("Create a default config file?")
        .with_default(false)
        .with_help_message(&format!("Will create {path}"))
        .prompt()
        .unwrap_or(false);
    if !confirmed {
        return Ok(());
    }

    std::fs::create_dir_all(&dir)?;
    std::fs::write(&path, default_config_yaml()?)?;
    println!("  {} Created {}", "✓".green(), path.cyan());
    Ok(())
}

fn default_config_yaml() -> anyhow::Result<String> {
    Ok(serde_saphyr::to_string(&Config::default())?)
}
