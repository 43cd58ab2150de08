//! Info command: package metadata and the effective configuration.

use camino::Utf8Path;
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use herald_core::announce::{DEFAULT_APP_NAME, DEFAULT_CHANGELOG_FILE, DEFAULT_DIFF_BASE};
use herald_core::config::{self, Config};
use herald_core::github::DEFAULT_API_URL;
use herald_core::message::Limits;

/// Arguments for the `info` subcommand.
#[derive(Args, Debug, Default)]
pub struct InfoArgs {}

#[derive(Serialize)]
struct PackageInfo {
    name: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    description: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    repository: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    license: &'static str,
}

impl PackageInfo {
    const fn new() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            description: env!("CARGO_PKG_DESCRIPTION"),
            repository: env!("CARGO_PKG_REPOSITORY"),
            license: env!("CARGO_PKG_LICENSE"),
        }
    }
}

#[derive(Serialize)]
struct ConfigInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    config_file: Option<String>,
    log_level: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_dir: Option<String>,
    app_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    environment: Option<String>,
    changelog_source: &'static str,
    changelog_file: String,
    diff_base: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    jira_host: Option<String>,
    /// Only whether it is set; the URL is a secret.
    slack_webhook_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    github_repository: Option<String>,
    github_api_url: String,
    limits: Limits,
}

impl ConfigInfo {
    fn from_config(config: &Config, cwd: &Utf8Path) -> Self {
        let announce = &config.announce;
        Self {
            config_file: config::find_project_config(cwd).map(|p| p.to_string()),
            log_level: config.log_level.as_str(),
            log_dir: config.log_dir.as_ref().map(ToString::to_string),
            app_name: announce
                .app_name
                .clone()
                .unwrap_or_else(|| DEFAULT_APP_NAME.to_string()),
            environment: announce.environment.clone(),
            changelog_source: announce.changelog_source.unwrap_or_default().as_str(),
            changelog_file: announce
                .changelog_file
                .as_ref()
                .map_or_else(|| DEFAULT_CHANGELOG_FILE.to_string(), ToString::to_string),
            diff_base: announce
                .diff_base
                .clone()
                .unwrap_or_else(|| DEFAULT_DIFF_BASE.to_string()),
            jira_host: announce.jira_host.clone(),
            slack_webhook_configured: announce.slack_webhook.is_some()
                || std::env::var_os("SLACK_WEBHOOK_URL").is_some(),
            github_repository: config.github.repository.clone(),
            github_api_url: config
                .github
                .api_url
                .clone()
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            limits: config.limits,
        }
    }
}

#[derive(Serialize)]
struct FullInfo {
    #[serde(flatten)]
    package: PackageInfo,
    config: ConfigInfo,
}

/// Print package information and the effective configuration.
#[instrument(name = "cmd_info", skip_all)]
pub fn cmd_info(
    _args: InfoArgs,
    global_json: bool,
    config: &Config,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing info command");

    let info = FullInfo {
        package: PackageInfo::new(),
        config: ConfigInfo::from_config(config, cwd),
    };

    if global_json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    let FullInfo { package, config } = &info;
    println!("{} {}", package.name.bold(), package.version.green());
    if !package.description.is_empty() {
        println!("{}", package.description);
    }
    if !package.license.is_empty() {
        println!("{}: {}", "License".dimmed(), package.license);
    }
    if !package.repository.is_empty() {
        println!("{}: {}", "Repository".dimmed(), package.repository.cyan());
    }

    println!();
    println!("{}", "Configuration".bold().underline());
    match &config.config_file {
        Some(path) => println!("{}: {}", "Config file".dimmed(), path.cyan()),
        None => println!("{}: {}", "Config file".dimmed(), "none found".yellow()),
    }
    println!("{}: {}", "Log level".dimmed(), config.log_level);
    if let Some(dir) = &config.log_dir {
        println!("{}: {}", "Log directory".dimmed(), dir);
    }

    println!();
    println!("{}", "Announcements".bold().underline());
    println!("{}: {}", "App name".dimmed(), config.app_name.cyan());
    if let Some(environment) = &config.environment {
        println!("{}: {}", "Environment".dimmed(), environment.cyan());
    }
    println!("{}: {}", "Source".dimmed(), config.changelog_source.cyan());
    println!("{}: {}", "Changelog".dimmed(), config.changelog_file);
    println!("{}: {}", "Diff base".dimmed(), config.diff_base);
    if let Some(host) = &config.jira_host {
        println!("{}: {}", "Jira".dimmed(), host.cyan());
    }
    if let Some(repository) = &config.github_repository {
        println!("{}: {}", "GitHub repository".dimmed(), repository.cyan());
    }
    println!(
        "{}: {}",
        "Slack webhook".dimmed(),
        if config.slack_webhook_configured {
            "configured".green().to_string()
        } else {
            "not set".yellow().to_string()
        }
    );
    println!(
        "{}: {} / {} chars",
        "Limits (category / message)".dimmed(),
        config.limits.max_category_chars,
        config.limits.max_message_chars
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    fn cwd() -> Utf8PathBuf {
        Utf8PathBuf::from("/tmp")
    }

    #[test]
    fn text_output_succeeds() {
        assert!(cmd_info(InfoArgs::default(), false, &Config::default(), &cwd()).is_ok());
    }

    #[test]
    fn json_output_succeeds() {
        assert!(cmd_info(InfoArgs::default(), true, &Config::default(), &cwd()).is_ok());
    }

    #[test]
    fn defaults_are_filled_in() {
        let info = ConfigInfo::from_config(&Config::default(), Utf8Path::new("/nonexistent"));
        assert!(info.config_file.is_none());
        assert_eq!(info.log_level, "info");
        assert_eq!(info.app_name, DEFAULT_APP_NAME);
        assert_eq!(info.changelog_source, "file");
        assert_eq!(info.changelog_file, "CHANGELOG.md");
        assert_eq!(info.diff_base, "HEAD~1");
        assert_eq!(info.github_api_url, DEFAULT_API_URL);
    }

    #[test]
    fn webhook_url_is_never_printed() {
        let mut config = Config::default();
        config.announce.slack_webhook = Some("https://hooks.slack.com/services/SECRET".into());
        let info = ConfigInfo::from_config(&config, &cwd());
        let json = serde_json::to_string(&info).unwrap();
        assert!(info.slack_webhook_configured);
        assert!(!json.contains("SECRET"));
    }
}
