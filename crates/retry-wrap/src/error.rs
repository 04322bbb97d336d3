//! Error types for retry-wrap configuration
//!
//! These errors cover policy construction and configuration loading. Failures
//! of the wrapped operation are never converted into this type; they surface
//! unchanged (or inside [`crate::retry::RetryError`] when a report is asked for).

use thiserror::Error;

/// Result type alias using retry-wrap's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration and validation errors
#[derive(Error, Debug)]
pub enum Error {
    /// A retry policy violates one of its constraints
    #[error("Invalid retry policy: {message}")]
    InvalidPolicy { message: String },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration value
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an invalid policy error
    pub fn invalid_policy(message: impl Into<String>) -> Self {
        Self::InvalidPolicy {
            message: message.into(),
        }
    }

    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
