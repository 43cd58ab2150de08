//! The announcement pipeline: resolve options, collect releases, compose,
//! dispatch.
//!
//! Options are resolved once from the loaded [`Config`] plus command-line
//! [`Overrides`] and then passed by parameter; nothing below this module
//! reads the environment.

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::changelog;
use crate::config::{ChangelogSource, Config};
use crate::error::ConfigError;
use crate::git::{self, GitError};
use crate::github::{self, DEFAULT_API_URL, GithubClient, GithubError, ReleaseListing};
use crate::message::{self, ComposeInput, Limits, Message};
use crate::release::{DiffStats, Release};
use crate::slack::{DispatchError, Dispatcher};
use crate::stats;

/// App name used when none is configured.
pub const DEFAULT_APP_NAME: &str = "Unknown application";

/// Changelog path used when none is configured.
pub const DEFAULT_CHANGELOG_FILE: &str = "CHANGELOG.md";

/// Revision the changelog is diffed against by default.
pub const DEFAULT_DIFF_BASE: &str = "HEAD~1";

/// Errors from the announcement pipeline.
#[derive(Error, Debug)]
pub enum AnnounceError {
    /// Invalid or incomplete configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Reading the changelog diff failed.
    #[error(transparent)]
    Git(#[from] GitError),

    /// Fetching releases from GitHub failed.
    #[error(transparent)]
    Github(#[from] GithubError),

    /// Posting the message failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// The source yielded nothing to announce.
    #[error("no releases found in {0}")]
    NoReleases(String),
}

/// Result alias for the announcement pipeline.
pub type AnnounceResult<T> = Result<T, AnnounceError>;

/// Values given on the command line (or via environment variables).
///
/// Each one, when set, wins over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// `--app-name`
    pub app_name: Option<String>,
    /// `--environment`
    pub environment: Option<String>,
    /// `--changelog-file`
    pub changelog_file: Option<Utf8PathBuf>,
    /// `--changelog-source`
    pub changelog_source: Option<ChangelogSource>,
    /// `--diff-base`
    pub diff_base: Option<String>,
    /// `--jira-host`
    pub jira_host: Option<String>,
    /// `--slack-webhook` / `SLACK_WEBHOOK_URL`
    pub slack_webhook: Option<String>,
    /// `--github-token` / `GITHUB_TOKEN`
    pub github_token: Option<String>,
    /// `--repository` / `GITHUB_REPOSITORY`
    pub github_repository: Option<String>,
    /// `--previous-version`
    pub previous_version: Option<String>,
    /// `--new-version`
    pub new_version: Option<String>,
}

/// Where releases are read from, with everything that source needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOptions {
    /// Lines added to a changelog file.
    File {
        /// Changelog path, relative to the repository.
        changelog_file: Utf8PathBuf,
        /// Revision the file is diffed against.
        diff_base: String,
    },
    /// Releases published between two tags.
    Github(GithubOptions),
}

/// Settings for the GitHub source.
#[derive(Clone, PartialEq, Eq)]
pub struct GithubOptions {
    /// API base URL.
    pub api_url: String,
    /// `owner/name`.
    pub repository: String,
    /// Bearer token.
    pub token: String,
    /// Tag deployed before this announcement.
    pub previous_version: String,
    /// Tag being deployed now.
    pub new_version: String,
}

impl std::fmt::Debug for GithubOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubOptions")
            .field("api_url", &self.api_url)
            .field("repository", &self.repository)
            .field("token", &"<redacted>")
            .field("previous_version", &self.previous_version)
            .field("new_version", &self.new_version)
            .finish()
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceOptions {
    /// Application name for the header.
    pub app_name: String,
    /// Environment label for the header.
    pub environment: Option<String>,
    /// Jira base URL for ticket links.
    pub jira_host: Option<String>,
    /// Webhook to post to; `None` only when posting was not requested.
    pub slack_webhook: Option<String>,
    /// Release source.
    pub source: SourceOptions,
    /// Message size limits.
    pub limits: Limits,
}

impl AnnounceOptions {
    /// Merge `config` and `overrides` and check that the selected source
    /// has what it needs.
    ///
    /// `repo` is only consulted for the `origin` remote when the GitHub
    /// source has no repository configured. With `require_webhook` the
    /// Slack webhook must be present.
    pub fn resolve(
        config: &Config,
        overrides: Overrides,
        repo: &Utf8Path,
        require_webhook: bool,
    ) -> AnnounceResult<Self> {
        let announce = &config.announce;

        let slack_webhook = non_empty(overrides.slack_webhook)
            .or_else(|| non_empty(announce.slack_webhook.clone()));
        if require_webhook && slack_webhook.is_none() {
            return Err(ConfigError::Missing {
                option: "slack-webhook",
                reason: "to post announcements (or set SLACK_WEBHOOK_URL)",
            }
            .into());
        }

        let source_kind = overrides
            .changelog_source
            .or(announce.changelog_source)
            .unwrap_or_default();

        let source = match source_kind {
            ChangelogSource::File => SourceOptions::File {
                changelog_file: overrides
                    .changelog_file
                    .or_else(|| announce.changelog_file.clone())
                    .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_CHANGELOG_FILE)),
                diff_base: non_empty(overrides.diff_base)
                    .or_else(|| non_empty(announce.diff_base.clone()))
                    .unwrap_or_else(|| DEFAULT_DIFF_BASE.to_string()),
            },
            ChangelogSource::Github => {
                const REASON: &str = "when using the github changelog source";
                let token = non_empty(overrides.github_token).ok_or(ConfigError::Missing {
                    option: "github-token",
                    reason: REASON,
                })?;
                let previous_version =
                    non_empty(overrides.previous_version).ok_or(ConfigError::Missing {
                        option: "previous-version",
                        reason: REASON,
                    })?;
                let new_version = non_empty(overrides.new_version).ok_or(ConfigError::Missing {
                    option: "new-version",
                    reason: REASON,
                })?;
                let repository = non_empty(overrides.github_repository)
                    .or_else(|| non_empty(config.github.repository.clone()))
                    .or_else(|| origin_repository(repo))
                    .ok_or(ConfigError::Missing {
                        option: "repository",
                        reason: "when using the github changelog source (or set GITHUB_REPOSITORY)",
                    })?;
                SourceOptions::Github(GithubOptions {
                    api_url: non_empty(config.github.api_url.clone())
                        .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
                    repository,
                    token,
                    previous_version,
                    new_version,
                })
            }
        };

        Ok(Self {
            app_name: non_empty(overrides.app_name)
                .or_else(|| non_empty(announce.app_name.clone()))
                .unwrap_or_else(|| DEFAULT_APP_NAME.to_string()),
            environment: non_empty(overrides.environment)
                .or_else(|| non_empty(announce.environment.clone())),
            jira_host: non_empty(overrides.jira_host)
                .or_else(|| non_empty(announce.jira_host.clone())),
            slack_webhook,
            source,
            limits: config.limits,
        })
    }

    /// Source name for display.
    pub const fn source_kind(&self) -> ChangelogSource {
        match self.source {
            SourceOptions::File { .. } => ChangelogSource::File,
            SourceOptions::Github(_) => ChangelogSource::Github,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn origin_repository(repo: &Utf8Path) -> Option<String> {
    let url = match git::remote_url(repo, "origin") {
        Ok(url) => url?,
        Err(e) => {
            warn!(%e, "could not read origin remote");
            return None;
        }
    };
    let (owner, name) = git::parse_owner_repo(&url)?;
    Some(format!("{owner}/{name}"))
}

/// Releases gathered from a source, ready to compose.
#[derive(Debug, Clone, Default)]
pub struct Collected {
    /// Releases, newest first.
    pub releases: Vec<Release>,
    /// Diff statistics across the whole range, when available.
    pub stats: Option<DiffStats>,
    /// Whether the range goes backwards.
    pub is_rollback: bool,
    /// Bullet lines that could not be parsed.
    pub dropped_lines: usize,
}

/// Collect releases from the source selected in `options`.
pub fn collect(options: &AnnounceOptions, repo: &Utf8Path) -> AnnounceResult<Collected> {
    match &options.source {
        SourceOptions::File {
            changelog_file,
            diff_base,
        } => collect_from_changelog(repo, changelog_file, diff_base),
        SourceOptions::Github(gh) => {
            let client = GithubClient::new(&gh.api_url, &gh.repository, &gh.token)?;
            collect_from_github(&client, &gh.previous_version, &gh.new_version)
        }
    }
}

/// Parse the lines the latest commit added to the changelog.
///
/// Diff stats span from the oldest release's previous tag to the newest
/// release's tag.
#[instrument(skip(repo))]
pub fn collect_from_changelog(
    repo: &Utf8Path,
    changelog_file: &Utf8Path,
    diff_base: &str,
) -> AnnounceResult<Collected> {
    let added = git::added_lines(repo, changelog_file, diff_base)?;
    let parsed = changelog::parse_changelog(&added);
    if parsed.releases.is_empty() {
        return Err(AnnounceError::NoReleases(format!(
            "lines added to {changelog_file} since {diff_base}"
        )));
    }

    let stats = match (parsed.releases.first(), parsed.releases.last()) {
        (Some(newest), Some(oldest)) => oldest
            .previous_version_tag
            .as_deref()
            .and_then(|from| stats::compute_stats(repo, from, &newest.version_tag)),
        _ => None,
    };

    info!(
        releases = parsed.releases.len(),
        dropped = parsed.dropped_lines,
        has_stats = stats.is_some(),
        "collected releases from changelog"
    );
    Ok(Collected {
        releases: parsed.releases,
        stats,
        is_rollback: false,
        dropped_lines: parsed.dropped_lines,
    })
}

/// Fetch and adapt the releases between two tags.
#[instrument(skip(listing))]
pub fn collect_from_github(
    listing: &impl ReleaseListing,
    previous_version: &str,
    new_version: &str,
) -> AnnounceResult<Collected> {
    let range = github::resolve_range(listing, previous_version, new_version)?;
    let releases = github::adapt_platform_releases(&range.releases);
    if releases.is_empty() {
        return Err(AnnounceError::NoReleases(format!(
            "GitHub releases between {previous_version} and {new_version}"
        )));
    }

    info!(
        releases = releases.len(),
        rollback = range.is_rollback,
        "collected releases from GitHub"
    );
    Ok(Collected {
        releases,
        stats: None,
        is_rollback: range.is_rollback,
        dropped_lines: 0,
    })
}

/// Compose the message for `collected`.
pub fn build_message(options: &AnnounceOptions, collected: &Collected) -> Message {
    message::compose(&ComposeInput {
        app_name: &options.app_name,
        environment: options.environment.as_deref(),
        releases: &collected.releases,
        stats: collected.stats,
        ticket_base_url: options.jira_host.as_deref(),
        is_rollback: collected.is_rollback,
        limits: options.limits,
    })
}

/// Compose and post `collected`, returning the message that was sent.
#[instrument(skip_all, fields(app = %options.app_name))]
pub fn announce(
    options: &AnnounceOptions,
    collected: &Collected,
    dispatcher: &impl Dispatcher,
) -> AnnounceResult<Message> {
    let message = build_message(options, collected);
    dispatcher.post(&message)?;
    info!(
        releases = collected.releases.len(),
        blocks = message.blocks.len(),
        "announcement posted"
    );
    Ok(message)
}
