//! In-process fakes for the orchestrator's collaborators

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use postmix_common::{Action, StatusEvent};
use postmix_worker::mastering::{Masterer, MasteringError};
use postmix_worker::notifier::Notifier;
use postmix_worker::storage::{LocalObjectStore, ObjectStore, StorageError};

/// Records every event instead of posting it
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<StatusEvent>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<StatusEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn actions(&self) -> Vec<Action> {
        self.events().iter().map(|e| e.action).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: &StatusEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Directory store that counts calls and can refuse uploads
pub struct CountingStore {
    inner: LocalObjectStore,
    pub probes: AtomicUsize,
    pub downloads: AtomicUsize,
    pub uploads: AtomicUsize,
    pub fail_uploads: bool,
}

impl CountingStore {
    pub fn new(root: &Path) -> Self {
        Self {
            inner: LocalObjectStore::new(root),
            probes: AtomicUsize::new(0),
            downloads: AtomicUsize::new(0),
            uploads: AtomicUsize::new(0),
            fail_uploads: false,
        }
    }

    pub fn total_calls(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
            + self.downloads.load(Ordering::SeqCst)
            + self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for CountingStore {
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.inner.exists(bucket, key).await
    }

    async fn download(&self, bucket: &str, key: &str, local_path: &Path) -> Result<(), StorageError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.inner.download(bucket, key, local_path).await
    }

    async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), StorageError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        if self.fail_uploads {
            return Err(StorageError::Status {
                status: 503,
                key: key.to_string(),
                message: "SlowDown".to_string(),
            });
        }
        self.inner.upload(local_path, bucket, key).await
    }
}

/// Mastering backend that always fails after touching the output path
pub struct FailingMasterer;

#[async_trait]
impl Masterer for FailingMasterer {
    async fn master(
        &self,
        _target_wav: Vec<u8>,
        _reference: &Path,
        output: &Path,
    ) -> Result<(), MasteringError> {
        tokio::fs::write(output, b"partial").await?;
        Err(MasteringError::SilentReference)
    }
}
