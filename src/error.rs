//! Error handling and custom error types
//!
//! Provides unified error handling across the relay using thiserror. The
//! `Input`, `Upstream` and `ContentMissing` variants form the relay taxonomy
//! and map onto HTTP status codes; the rest are infrastructure failures.

use thiserror::Error;

/// Fixed message used when the provider answers without usable text.
pub const CONTENT_MISSING_MESSAGE: &str = "No reply content returned by completion provider";

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] dotenvy::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Request rejected before reaching the provider.
    #[error("{message}")]
    Input { status: u16, message: String },

    #[error("{0}")]
    Upstream(String),

    #[error("{}", CONTENT_MISSING_MESSAGE)]
    ContentMissing,
}

impl Error {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Error::Input {
            status: 400,
            message: message.into(),
        }
    }

    pub fn method_not_allowed() -> Self {
        Error::Input {
            status: 405,
            message: "Method not allowed".to_string(),
        }
    }

    /// HTTP status reported to the caller for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Input { status, .. } => *status,
            _ => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
