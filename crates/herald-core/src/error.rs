//! Error types for herald-core

use thiserror::Error;

/// Errors that can occur when working with configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error("invalid configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),

    /// A value required for the selected workflow is missing.
    #[error("{option} is required {reason}")]
    Missing {
        /// The option name as spelled on the command line (e.g., `slack-webhook`).
        option: &'static str,
        /// When the option is required (e.g., "when using the github changelog source").
        reason: &'static str,
    },
}

/// Result type alias using [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;
