//! Error types for Vesper

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Provider credentials or endpoint missing. Fatal for every gateway use.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Provider or network failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Model output could not be parsed as JSON. Carries a bounded excerpt.
    #[error("Malformed model output: {excerpt}")]
    MalformedOutput { excerpt: String },

    /// Model output parsed but broke the insight/report contract.
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Row store error: {0}")]
    Store(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

impl Error {
    /// Whether the entry pipeline converts this error into a fallback write
    /// instead of treating it as fatal.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::MalformedOutput { .. } | Error::SchemaViolation(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
