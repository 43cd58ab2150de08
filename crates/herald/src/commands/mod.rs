//! Command implementations

pub mod announce;

pub mod doctor;

pub mod info;

pub mod preview;

use std::time::Duration;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

use herald_core::announce::{self as pipeline, AnnounceOptions, Collected, Overrides};
use herald_core::config::{ChangelogSource, Config};

/// Release source selection on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SourceChoice {
    /// Lines added to the changelog file by the latest commit
    File,
    /// GitHub releases between --previous-version and --new-version
    Github,
}

impl From<SourceChoice> for ChangelogSource {
    fn from(choice: SourceChoice) -> Self {
        match choice {
            SourceChoice::File => Self::File,
            SourceChoice::Github => Self::Github,
        }
    }
}

/// Flags shared by `announce` and `preview`.
#[derive(Args, Debug, Default, Clone)]
pub struct SourceArgs {
    /// Application name shown in the header [default: Unknown application]
    #[arg(long, value_name = "NAME")]
    pub app_name: Option<String>,

    /// Deployment environment shown in the header (e.g., production)
    #[arg(long, value_name = "ENV")]
    pub environment: Option<String>,

    /// Changelog file, relative to the repository [default: CHANGELOG.md]
    #[arg(long, value_name = "FILE")]
    pub changelog_file: Option<Utf8PathBuf>,

    /// Where releases come from [default: file]
    #[arg(long, value_enum, value_name = "SOURCE")]
    pub changelog_source: Option<SourceChoice>,

    /// Revision the changelog is diffed against [default: HEAD~1]
    #[arg(long, value_name = "REV")]
    pub diff_base: Option<String>,

    /// Jira base URL; ticket references become links
    #[arg(long, value_name = "URL")]
    pub jira_host: Option<String>,

    /// GitHub token (github source)
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true, value_name = "TOKEN")]
    pub github_token: Option<String>,

    /// Repository as owner/name (github source) [default: origin remote]
    #[arg(long, env = "GITHUB_REPOSITORY", value_name = "OWNER/NAME")]
    pub repository: Option<String>,

    /// Tag that was deployed before (github source)
    #[arg(long, value_name = "TAG")]
    pub previous_version: Option<String>,

    /// Tag being deployed now (github source)
    #[arg(long, value_name = "TAG")]
    pub new_version: Option<String>,
}

impl SourceArgs {
    /// Command-line values as config overrides.
    pub fn into_overrides(self, slack_webhook: Option<String>) -> Overrides {
        Overrides {
            app_name: self.app_name,
            environment: self.environment,
            changelog_file: self.changelog_file,
            changelog_source: self.changelog_source.map(Into::into),
            diff_base: self.diff_base,
            jira_host: self.jira_host,
            slack_webhook,
            github_token: self.github_token,
            github_repository: self.repository,
            previous_version: self.previous_version,
            new_version: self.new_version,
        }
    }
}

/// Resolve options and collect releases, with a spinner while waiting.
pub fn resolve_and_collect(
    args: SourceArgs,
    slack_webhook: Option<String>,
    require_webhook: bool,
    config: &Config,
    cwd: &Utf8Path,
) -> anyhow::Result<(AnnounceOptions, Collected)> {
    let options = AnnounceOptions::resolve(
        config,
        args.into_overrides(slack_webhook),
        cwd,
        require_webhook,
    )?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.cyan} {msg}")?);
    spinner.set_message(format!("Reading releases from {}...", options.source_kind()));
    spinner.enable_steady_tick(Duration::from_millis(80));
    let collected = pipeline::collect(&options, cwd);
    spinner.finish_and_clear();

    let collected = collected.context("failed to collect releases")?;
    if collected.dropped_lines > 0 {
        eprintln!(
            "{} skipped {} malformed changelog {}",
            "warning:".yellow().bold(),
            collected.dropped_lines,
            if collected.dropped_lines == 1 { "line" } else { "lines" }
        );
    }
    Ok((options, collected))
}
