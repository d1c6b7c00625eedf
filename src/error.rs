//! Error types for tgstat
//!
//! Every variant that wraps a lower-level failure keeps it as its `source`,
//! so the whole chain is available when the error is reported.

use crate::backfill::BackfillError;
use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read config file '{path}': {source}")]
    ConfigFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse TOML config '{path}': {source}")]
    ConfigParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration in '{path}': {reason}")]
    ConfigValidationFailed { path: String, reason: String },

    #[error("Failed to read '{path}': {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode JSON in '{path}': {source}")]
    JsonDecode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid expression {pattern:?}: {source}")]
    InvalidExpression {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Backfill failed: {0}")]
    Backfill(#[from] BackfillError),

    #[error("Request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to {url} returned {status}, expected 204 No Content")]
    UnexpectedStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results
pub type AppResult<T> = Result<T, AppError>;
