//! Layered configuration files.
//!
//! Sources, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. User config: `config.<ext>` in the platform config directory
//!    (`~/.config/herald/` on Linux)
//! 3. Project config: the nearest `.herald.<ext>` or `herald.<ext>`, searching
//!    upward from the working directory and stopping at the repository root
//! 4. Files passed explicitly (`--config`)
//!
//! `<ext>` is `toml`, `yaml`, `yml`, or `json`. Command-line flags and
//! environment variables override all of these; that last layer is applied
//! when [`crate::announce::AnnounceOptions`] are resolved.
//!
//! ```no_run
//! use camino::Utf8PathBuf;
//! use herald_core::config::ConfigLoader;
//!
//! let cwd = Utf8PathBuf::try_from(std::env::current_dir()?)?;
//! let config = ConfigLoader::new().with_project_search(&cwd).load()?;
//! println!("{:?}", config.announce.app_name);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use figment::Figment;
use figment::providers::{Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::message::Limits;

/// Everything herald reads from config files.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Minimum level written to the JSONL log.
    pub log_level: LogLevel,
    /// Where JSONL logs go (platform default when unset).
    pub log_dir: Option<Utf8PathBuf>,
    /// Announcement settings.
    pub announce: AnnounceConfig,
    /// Message size limits.
    pub limits: Limits,
    /// GitHub release source settings.
    pub github: GithubConfig,
}

/// The `[announce]` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct AnnounceConfig {
    /// Application name shown in the message header.
    pub app_name: Option<String>,
    /// Deployment environment label.
    pub environment: Option<String>,
    /// Changelog path, relative to the repository root.
    pub changelog_file: Option<Utf8PathBuf>,
    /// Where releases come from.
    pub changelog_source: Option<ChangelogSource>,
    /// Revision the changelog is diffed against (default `HEAD~1`).
    pub diff_base: Option<String>,
    /// Jira base URL for ticket links.
    pub jira_host: Option<String>,
    /// Slack incoming webhook URL.
    ///
    /// Prefer the `SLACK_WEBHOOK_URL` environment variable for shared configs.
    pub slack_webhook: Option<String>,
}

/// The `[github]` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct GithubConfig {
    /// `owner/name`; defaults to the `origin` remote.
    pub repository: Option<String>,
    /// API base URL, for GitHub Enterprise.
    pub api_url: Option<String>,
}

/// Release data source.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangelogSource {
    /// Lines added to the changelog file by the latest commit.
    #[default]
    File,
    /// Releases published on GitHub between two tags.
    Github,
}

impl ChangelogSource {
    /// Lowercase name as used in config files.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Github => "github",
        }
    }
}

impl fmt::Display for ChangelogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Everything, including per-line parser decisions.
    Debug,
    /// Pipeline milestones.
    #[default]
    Info,
    /// Absorbed failures only.
    Warn,
    /// Fatal errors only.
    Error,
}

impl LogLevel {
    /// Lowercase name, suitable for an `EnvFilter` directive.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

const CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

const APP_NAME: &str = "herald";

/// Project search never climbs past a directory containing this entry.
const BOUNDARY_MARKER: &str = ".git";

/// Discovers and merges config files.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    project_search_root: Option<Utf8PathBuf>,
    include_user_config: bool,
    explicit_files: Vec<Utf8PathBuf>,
}

impl ConfigLoader {
    /// A loader that reads user config and stops project search at `.git`.
    pub fn new() -> Self {
        Self {
            project_search_root: None,
            include_user_config: true,
            explicit_files: Vec::new(),
        }
    }

    /// Search for a project config upward from `path`.
    pub fn with_project_search<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.project_search_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Toggle the user config layer.
    pub const fn with_user_config(mut self, include: bool) -> Self {
        self.include_user_config = include;
        self
    }

    /// Add a file on top of the discovered ones. Later files win.
    pub fn with_file<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.explicit_files.push(path.as_ref().to_path_buf());
        self
    }

    /// Merge every source into a [`Config`].
    #[tracing::instrument(skip(self), fields(search_root = ?self.project_search_root))]
    pub fn load(self) -> ConfigResult<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        for file in self.sources() {
            tracing::debug!(%file, "merging config file");
            figment = merge_file(figment, &file);
        }

        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::Deserialize(Box::new(e)))?;
        tracing::info!(
            log_level = config.log_level.as_str(),
            source = config
                .announce
                .changelog_source
                .unwrap_or_default()
                .as_str(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Files that will be merged, lowest precedence first.
    fn sources(&self) -> Vec<Utf8PathBuf> {
        let user = self
            .include_user_config
            .then(find_user_config)
            .flatten();
        let project = self
            .project_search_root
            .as_ref()
            .and_then(find_project_config);

        user.into_iter()
            .chain(project)
            .chain(self.explicit_files.iter().cloned())
            .collect()
    }
}

fn find_user_config() -> Option<Utf8PathBuf> {
    let dir = user_config_dir()?;
    CONFIG_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("config.{ext}")))
        .find(|candidate| candidate.is_file())
}

fn merge_file(figment: Figment, path: &Utf8Path) -> Figment {
    match path.extension() {
        Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path.as_str())),
        Some("json") => figment.merge(Json::file_exact(path.as_str())),
        _ => figment.merge(Toml::file_exact(path.as_str())),
    }
}

/// Nearest project config file at or above `start`.
///
/// The repository root (the first directory holding `.git`) is still
/// searched, but nothing above it is.
pub fn find_project_config<P: AsRef<Utf8Path>>(start: P) -> Option<Utf8PathBuf> {
    for dir in start.as_ref().ancestors() {
        let found = CONFIG_EXTENSIONS.iter().find_map(|ext| {
            [format!(".{APP_NAME}.{ext}"), format!("{APP_NAME}.{ext}")]
                .into_iter()
                .map(|name| dir.join(name))
                .find(|candidate| candidate.is_file())
        });
        if found.is_some() {
            return found;
        }
        if dir.join(BOUNDARY_MARKER).exists() {
            break;
        }
    }
    None
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// Platform config directory (`~/.config/herald/` on Linux).
pub fn user_config_dir() -> Option<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(project_dirs()?.config_dir().to_path_buf()).ok()
}

/// Platform data directory (`~/.local/share/herald/` on Linux).
pub fn user_data_dir() -> Option<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(project_dirs()?.data_dir().to_path_buf()).ok()
}

/// Machine-local data directory; the default parent of the log directory.
pub fn user_data_local_dir() -> Option<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(project_dirs()?.data_local_dir().to_path_buf()).ok()
}
