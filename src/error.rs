use std::time::Duration;

use thiserror::Error;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid time value: {0}")]
    InvalidTime(String),

    #[error("Hours feed request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Hours feed returned status {0}")]
    Status(u16),

    #[error("Hours feed rate limited, retry after {0:?}")]
    RateLimited(Duration),

    #[error("Malformed hours document: {0}")]
    Document(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

/// Type alias for Result with our Error type
pub type HoursResult<T> = Result<T, Error>;

/// Helper to create configuration errors
pub fn config_error(message: &str) -> Error {
    Error::Config(message.to_string())
}
