//! Object storage gateway
//!
//! Existence probes, downloads and uploads against an object store, plus the
//! bounded polling loop used to wait for assets published by upstream stages.
//!
//! Backends:
//! - [`HttpObjectStore`]: S3 REST API (path-style, optional SigV4 signing)
//! - [`LocalObjectStore`]: directory tree, for local runs

mod http;
mod local;
pub mod sigv4;

pub use http::HttpObjectStore;
pub use local::LocalObjectStore;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Object does not exist
    #[error("Object not found: s3://{bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// Store answered with an unexpected status
    #[error("Storage returned status {status} for {key}: {message}")]
    Status {
        status: u16,
        key: String,
        message: String,
    },

    /// Request never completed (connection, TLS, timeout)
    #[error("Storage request failed: {0}")]
    Transport(String),

    /// Key cannot be mapped onto this backend
    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    /// Local file error while staging or publishing
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        StorageError::Transport(err.to_string())
    }
}

/// Object store operations used by the job pipeline
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Single existence probe.
    ///
    /// `Ok(false)` only for "not found"; every other failure is an error.
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError>;

    /// Download `key` into `local_path`, replacing any existing file
    async fn download(&self, bucket: &str, key: &str, local_path: &Path) -> Result<(), StorageError>;

    /// Upload `local_path` to `key`
    async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), StorageError>;
}

/// Time one probe may take when the deadline is closer than this
pub const MIN_PROBE_BUDGET: Duration = Duration::from_secs(1);

/// Poll `exists` until the object appears or `timeout` elapses.
///
/// **Algorithm:**
/// 1. Probe (always at least once)
/// 2. If found, return `true`
/// 3. If the deadline has passed, return `false`
/// 4. Sleep `interval` (clipped to the deadline) and go to 1, unless the
///    sleep reached the deadline, in which case return `false`
///
/// Fixed interval, no backoff. Probe errors other than "not found" are
/// returned immediately. A probe that has not answered by the deadline
/// (or after [`MIN_PROBE_BUDGET`], whichever is later) counts as "not found".
pub async fn wait_until_available(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    timeout: Duration,
    interval: Duration,
) -> Result<bool, StorageError> {
    let deadline = Instant::now() + timeout;
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        let budget = deadline
            .saturating_duration_since(Instant::now())
            .max(MIN_PROBE_BUDGET);
        match tokio::time::timeout(budget, store.exists(bucket, key)).await {
            Ok(found) => {
                if found? {
                    info!(bucket, key, attempt, "File is now available");
                    return Ok(true);
                }
            }
            Err(_) => warn!(
                bucket,
                key,
                attempt,
                budget_ms = budget.as_millis() as u64,
                "Existence probe did not answer in time"
            ),
        }

        let now = Instant::now();
        if now >= deadline {
            break;
        }

        debug!(bucket, key, attempt, "Waiting for file");
        tokio::time::sleep_until((now + interval).min(deadline)).await;

        if Instant::now() >= deadline {
            break;
        }
    }

    error!(
        bucket,
        key,
        attempt,
        timeout_secs = timeout.as_secs(),
        "File did not become available within the timeout period"
    );
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Reports the object present from the `appears_on`-th probe onwards
    struct ScriptedStore {
        probes: AtomicU32,
        appears_on: Option<u32>,
        fail_with_status: bool,
    }

    impl ScriptedStore {
        fn new(appears_on: Option<u32>) -> Self {
            Self {
                probes: AtomicU32::new(0),
                appears_on,
                fail_with_status: false,
            }
        }

        fn probes(&self) -> u32 {
            self.probes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ObjectStore for ScriptedStore {
        async fn exists(&self, _bucket: &str, key: &str) -> Result<bool, StorageError> {
            let n = self.probes.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_with_status {
                return Err(StorageError::Status {
                    status: 403,
                    key: key.to_string(),
                    message: "AccessDenied".to_string(),
                });
            }
            Ok(self.appears_on.is_some_and(|on| n >= on))
        }

        async fn download(&self, _: &str, _: &str, _: &Path) -> Result<(), StorageError> {
            unreachable!()
        }

        async fn upload(&self, _: &Path, _: &str, _: &str) -> Result<(), StorageError> {
            unreachable!()
        }
    }

    const TIMEOUT: Duration = Duration::from_secs(10);
    const INTERVAL: Duration = Duration::from_secs(5);

    #[tokio::test(start_paused = true)]
    async fn test_available_on_first_probe() {
        let store = ScriptedStore::new(Some(1));
        let start = Instant::now();

        let found = wait_until_available(&store, "b", "k", TIMEOUT, INTERVAL).await.unwrap();

        assert!(found);
        assert_eq!(store.probes(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_available_on_second_probe() {
        let store = ScriptedStore::new(Some(2));
        let start = Instant::now();

        let found = wait_until_available(&store, "b", "k", TIMEOUT, INTERVAL).await.unwrap();

        assert!(found);
        assert_eq!(store.probes(), 2);
        assert_eq!(start.elapsed(), INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_at_boundary() {
        let store = ScriptedStore::new(None);
        let start = Instant::now();

        let found = wait_until_available(&store, "b", "k", TIMEOUT, INTERVAL).await.unwrap();

        assert!(!found);
        // Probes at t=0 and t=5; the sleep ending at t=10 hits the deadline
        assert_eq!(store.probes(), 2);
        assert_eq!(start.elapsed(), TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_object_appearing_after_timeout_is_missed() {
        let store = ScriptedStore::new(Some(3));

        let found = wait_until_available(&store, "b", "k", TIMEOUT, INTERVAL).await.unwrap();

        assert!(!found);
        assert_eq!(store.probes(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_still_probes_once() {
        let store = ScriptedStore::new(Some(1));
        assert!(wait_until_available(&store, "b", "k", Duration::ZERO, INTERVAL)
            .await
            .unwrap());

        let store = ScriptedStore::new(None);
        assert!(!wait_until_available(&store, "b", "k", Duration::ZERO, INTERVAL)
            .await
            .unwrap());
        assert_eq!(store.probes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_uneven_timeout_clips_last_sleep() {
        let store = ScriptedStore::new(None);
        let start = Instant::now();

        let found = wait_until_available(&store, "b", "k", Duration::from_secs(12), INTERVAL)
            .await
            .unwrap();

        assert!(!found);
        assert_eq!(store.probes(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(12));
    }

    /// Accepts the probe and never answers
    struct StalledStore;

    #[async_trait]
    impl ObjectStore for StalledStore {
        async fn exists(&self, _: &str, _: &str) -> Result<bool, StorageError> {
            std::future::pending().await
        }

        async fn download(&self, _: &str, _: &str, _: &Path) -> Result<(), StorageError> {
            unreachable!()
        }

        async fn upload(&self, _: &Path, _: &str, _: &str) -> Result<(), StorageError> {
            unreachable!()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_probe_ends_at_deadline() {
        let start = Instant::now();

        let found = wait_until_available(&StalledStore, "b", "k", TIMEOUT, INTERVAL)
            .await
            .unwrap();

        assert!(!found);
        assert_eq!(start.elapsed(), TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_probe_with_zero_timeout_gets_minimum_budget() {
        let start = Instant::now();

        let found = wait_until_available(&StalledStore, "b", "k", Duration::ZERO, INTERVAL)
            .await
            .unwrap();

        assert!(!found);
        assert_eq!(start.elapsed(), MIN_PROBE_BUDGET);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_error_propagates_immediately() {
        let mut store = ScriptedStore::new(None);
        store.fail_with_status = true;

        let err = wait_until_available(&store, "b", "k", TIMEOUT, INTERVAL)
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Status { status: 403, .. }));
        assert_eq!(store.probes(), 1);
    }
}
