//! Error types.

use std::time::Duration;

use thiserror::Error;

/// Failure talking to the chat backend.
///
/// Every variant is recovered by the controller: the pending placeholder is
/// resolved with the "connection error" text and the session continues.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The request could not be sent or the body could not be read.
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body was not JSON.
    #[error("Invalid response body: {0}")]
    InvalidBody(#[from] serde_json::Error),

    /// The configured request timeout elapsed.
    #[error("Backend did not answer within {0:?}")]
    Timeout(Duration),
}

/// Application-level errors (startup and wiring).
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration could not be loaded or is inconsistent.
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// The backend URL is not a valid absolute URL.
    #[error("Invalid backend URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    /// Listener or socket failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
