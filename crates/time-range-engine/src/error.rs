//! Error types for time-range operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RangeError {
    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid preset: {0}")]
    InvalidPreset(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unparseable input: {0}")]
    UnparseableInput(String),

    #[error("Fallback unavailable: {0}")]
    FallbackUnavailable(String),

    #[cfg(feature = "controller")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, RangeError>;
