//! Common error types for postmix

use thiserror::Error;

/// Common result type for postmix operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading configuration or reading job messages
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Queue envelope could not be read at all
    #[error("Malformed envelope: {0}")]
    Envelope(String),

    /// Job body is missing a required field or is not valid JSON
    #[error("Invalid job: {0}")]
    InvalidJob(String),

    /// Track ID has no instrumental in the catalog
    #[error("Invalid trackID: {0}")]
    UnknownTrack(i64),
}
