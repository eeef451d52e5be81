//! Mastering adapter
//!
//! Reference-based mastering behind one call contract: take the encoded mix,
//! a reference file and an output path, write exactly one 24-bit PCM WAV.
//!
//! Backends:
//! - [`LevelMatchMasterer`]: native loudness matching (default)
//! - [`CommandMasterer`]: delegates to an external program

mod command;
mod level_match;

pub use command::CommandMasterer;
pub use level_match::LevelMatchMasterer;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::audio::DecodeError;

/// Mastering errors
#[derive(Debug, Error)]
pub enum MasteringError {
    #[error("Failed to decode {0}")]
    Decode(#[from] DecodeError),

    #[error("Reference track is silent")]
    SilentReference,

    #[error("Failed to write result: {0}")]
    Encode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Mastering program exited with {status}: {stderr}")]
    Command { status: String, stderr: String },

    #[error("Mastering produced no output at {0}")]
    MissingOutput(PathBuf),

    #[error("Mastering task failed: {0}")]
    Task(String),
}

impl From<hound::Error> for MasteringError {
    fn from(err: hound::Error) -> Self {
        MasteringError::Encode(err.to_string())
    }
}

/// Reference mastering transform
#[async_trait]
pub trait Masterer: Send + Sync {
    /// Master `target_wav` (encoded WAV stream) against the reference file,
    /// writing the result to `output`
    async fn master(
        &self,
        target_wav: Vec<u8>,
        reference: &Path,
        output: &Path,
    ) -> Result<(), MasteringError>;
}
