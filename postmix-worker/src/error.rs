//! Error types for postmix-worker
//!
//! [`JobError`] is the per-job failure taxonomy; every variant aborts the job
//! and is reported through one `error` status event. [`ApiError`] maps host
//! failures onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use postmix_common::job::Asset;

use crate::mastering::MasteringError;
use crate::mixer::MixError;
use crate::storage::StorageError;

/// Job failure
#[derive(Debug, Error)]
pub enum JobError {
    /// Body unreadable, or track ID / file name missing
    #[error("Invalid job: {0}")]
    InvalidJob(String),

    /// Track ID not in the catalog
    #[error("Invalid trackID: {0}")]
    UnknownTrack(i64),

    /// Asset did not appear before the polling deadline
    #[error("{asset} file not available within timeout: {key}")]
    AssetUnavailable { asset: Asset, key: String },

    /// Probe or download failed
    #[error("Failed to download {asset} file {key}: {source}")]
    Download {
        asset: Asset,
        key: String,
        source: StorageError,
    },

    #[error("Failed to mix audio tracks: {0}")]
    Mix(#[from] MixError),

    #[error("Mastering failed: {0}")]
    Mastering(#[from] MasteringError),

    #[error("Failed to upload {key}: {source}")]
    Upload { key: String, source: StorageError },
}

impl From<postmix_common::Error> for JobError {
    fn from(err: postmix_common::Error) -> Self {
        match err {
            postmix_common::Error::UnknownTrack(id) => JobError::UnknownTrack(id),
            postmix_common::Error::InvalidJob(msg) => JobError::InvalidJob(msg),
            other => JobError::InvalidJob(other.to_string()),
        }
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<postmix_common::Error> for ApiError {
    fn from(err: postmix_common::Error) -> Self {
        match err {
            postmix_common::Error::Envelope(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
