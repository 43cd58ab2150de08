//! Core library for herald.
//!
//! Turns release notes into a compact Slack announcement. Releases come
//! either from the lines a commit added to a changelog file or from GitHub
//! releases between two tags; both become [`Release`] records, which
//! [`message::compose`] renders into a size-bounded Block Kit [`Message`].
//!
//! # Modules
//!
//! - [`announce`] - Option resolution and the end-to-end pipeline
//! - [`changelog`] - Changelog text parser
//! - [`config`] - Configuration file discovery and loading
//! - [`error`] - Configuration errors
//! - [`git`] - Git shell-outs
//! - [`github`] - GitHub release listing, range resolution, and adaptation
//! - [`message`] - Block model and message composer
//! - [`release`] - Release data model
//! - [`slack`] - Webhook dispatch
//! - [`stats`] - Diff statistics
//! - [`ticket`] - Ticket reference extraction and linking
//!
//! # Quick Start
//!
//! ```no_run
//! use herald_core::changelog::parse_releases;
//! use herald_core::message::{compose, ComposeInput, Limits};
//!
//! let text = std::fs::read_to_string("CHANGELOG.md")?;
//! let releases = parse_releases(&text);
//! let message = compose(&ComposeInput {
//!     app_name: "Billing API",
//!     environment: Some("production"),
//!     releases: &releases,
//!     stats: None,
//!     ticket_base_url: None,
//!     is_rollback: false,
//!     limits: Limits::default(),
//! });
//! println!("{}", message.to_json()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
#![deny(unsafe_code)]

pub mod announce;

pub mod changelog;

pub mod config;

pub mod error;

pub mod git;

pub mod github;

pub mod message;

pub mod release;

pub mod slack;

pub mod stats;

pub mod ticket;

pub use config::{ChangelogSource, Config, ConfigLoader, LogLevel};

pub use error::{ConfigError, ConfigResult};

pub use message::{Block, Message};

pub use release::{ChangeEntry, DiffStats, Release};
