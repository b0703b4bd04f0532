//! Error types for video-status-poller
//!
//! Two layers of errors live here:
//! - [`Error`], the crate-wide error used by configuration loading, input
//!   reading, the result sink and the mock status service
//! - [`FetchError`], the classification of a single failed status lookup.
//!   A `FetchError` never leaves the gateway; it is logged and collapsed
//!   into [`StatusReading::Indeterminate`](crate::types::StatusReading).

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for video-status-poller operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for video-status-poller
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "timeout_ms")
        key: Option<String>,
    },

    /// Input file with item IDs does not exist
    #[error("input file does not exist: {}", .0.display())]
    InputNotFound(PathBuf),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Base URI could not be parsed
    #[error("invalid base URI: {0}")]
    InvalidUri(#[from] url::ParseError),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

/// Why a single status lookup produced no usable answer
///
/// Every variant is treated the same way by the poll worker (as an
/// indeterminate reading); the split exists for logs.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, DNS, TLS or request timeout failure
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with something other than 200 OK
    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),

    /// The body was not a valid status document
    #[error("malformed status response: {0}")]
    Parse(#[from] serde_json::Error),
}

impl FetchError {
    /// Short machine-readable label used as a log field
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Transport(_) => "transport",
            FetchError::HttpStatus(_) => "http_status",
            FetchError::Parse(_) => "parse",
        }
    }
}
