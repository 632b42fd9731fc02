//! Error types for EchoTrack.

use thiserror::Error;

/// Main error type for EchoTrack operations.
#[derive(Error, Debug)]
pub enum EchoTrackError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Pixel format mismatch: {0}")]
    FormatMismatch(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for EchoTrack operations.
pub type Result<T> = std::result::Result<T, EchoTrackError>;
