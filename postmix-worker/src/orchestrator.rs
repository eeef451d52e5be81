//! Job orchestrator
//!
//! Drives one job through the pipeline:
//!
//! 1. Parse the record body and resolve asset paths (no I/O)
//! 2. Emit `start`
//! 3. For reference, instrumental, vocals: wait for the object, download it
//! 4. Mix vocals onto the instrumental
//! 5. Master the mix against the reference
//! 6. Upload the result, emit `end`
//!
//! Any failure emits one `error` event instead of `end`. Staging files created
//! for the job are removed afterwards whatever the outcome. Records of one
//! envelope are processed in order; a failed record does not stop the rest.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, info_span, warn, Instrument};

use postmix_common::job::{Asset, AssetPaths, Job, JobBody};
use postmix_common::{QueueEnvelope, StatusEvent};

use crate::error::JobError;
use crate::mastering::Masterer;
use crate::mixer::{self, MixError};
use crate::notifier::Notifier;
use crate::storage::{self, ObjectStore, StorageError};

/// Settings the pipeline needs per job
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub bucket: String,
    pub staging_dir: PathBuf,
    pub poll_timeout: Duration,
    pub poll_interval: Duration,
}

/// Result of one record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JobOutcome {
    Completed {
        #[serde(rename = "songID")]
        song_id: i64,
        key: String,
    },
    Failed {
        #[serde(rename = "songID")]
        song_id: i64,
        error: String,
    },
}

impl JobOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, JobOutcome::Completed { .. })
    }
}

/// Local files created for one job
///
/// Paths are registered before they are written so partial downloads are
/// removed too. Anything not removed by [`StagingFiles::cleanup`] is removed
/// on drop.
#[derive(Debug, Default)]
pub struct StagingFiles {
    paths: Vec<PathBuf>,
}

impl StagingFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, path: &Path) {
        if !self.paths.iter().any(|p| p == path) {
            self.paths.push(path.to_path_buf());
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Delete every tracked file. Failures are logged, never returned.
    pub async fn cleanup(&mut self) {
        for path in self.paths.drain(..) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => info!(path = %path.display(), "Deleted temporary file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(path = %path.display(), "Temporary file already absent")
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to delete temporary file"),
            }
        }
    }
}

impl Drop for StagingFiles {
    fn drop(&mut self) {
        for path in self.paths.drain(..) {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Runs jobs against injected storage, notification and mastering backends
pub struct Orchestrator {
    store: Arc<dyn ObjectStore>,
    notifier: Arc<dyn Notifier>,
    masterer: Arc<dyn Masterer>,
    config: PipelineConfig,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        notifier: Arc<dyn Notifier>,
        masterer: Arc<dyn Masterer>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            masterer,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Handle a raw envelope. Only a malformed envelope is an error.
    pub async fn handle_message(&self, raw: &str) -> postmix_common::Result<Vec<JobOutcome>> {
        debug!(envelope = %raw, "Queue message received");
        let envelope = QueueEnvelope::from_json(raw)?;
        Ok(self.handle_envelope(&envelope).await)
    }

    /// Handle every record in order
    pub async fn handle_envelope(&self, envelope: &QueueEnvelope) -> Vec<JobOutcome> {
        info!(records = envelope.records.len(), "Handling queue message");
        let mut outcomes = Vec::with_capacity(envelope.records.len());
        for record in &envelope.records {
            outcomes.push(self.handle_record(&record.body).await);
        }
        outcomes
    }

    /// Handle one record body. Never fails: failures become `error` events.
    pub async fn handle_record(&self, body: &str) -> JobOutcome {
        let parsed = JobBody::parse(body);
        let song_id = parsed.as_ref().map(JobBody::reported_song_id).unwrap_or(0);

        let prepared = parsed
            .and_then(JobBody::into_job)
            .and_then(|job| {
                let paths = job.asset_paths(&self.config.staging_dir)?;
                Ok((job, paths))
            })
            .map_err(JobError::from);

        let (job, paths) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => return self.fail(song_id, e).await,
        };

        let span = info_span!("job", song_id = job.song_id, track_id = job.track_id);
        self.process(job, paths).instrument(span).await
    }

    async fn process(&self, job: Job, paths: AssetPaths) -> JobOutcome {
        info!(file_name = %job.file_name, "Starting job");
        self.notifier.notify(&StatusEvent::start(job.song_id)).await;

        let mut staging = StagingFiles::new();
        let result = self.run(&paths, &mut staging).await;

        let outcome = match result {
            Ok(()) => {
                info!(key = %paths.output_key, "Job completed");
                self.notifier
                    .notify(&StatusEvent::end(job.song_id, paths.output_file_name.clone()))
                    .await;
                JobOutcome::Completed {
                    song_id: job.song_id,
                    key: paths.output_key.clone(),
                }
            }
            Err(e) => self.fail(job.song_id, e).await,
        };

        staging.cleanup().await;
        outcome
    }

    async fn fail(&self, song_id: i64, err: JobError) -> JobOutcome {
        error!(song_id, error = %err, "Job failed");
        let message = err.to_string();
        self.notifier
            .notify(&StatusEvent::error(song_id, message.clone()))
            .await;
        JobOutcome::Failed {
            song_id,
            error: message,
        }
    }

    async fn run(&self, paths: &AssetPaths, staging: &mut StagingFiles) -> Result<(), JobError> {
        for asset in Asset::ALL {
            self.stage(asset, paths, staging).await?;
        }

        let vocals = paths.local_vocals.clone();
        let instrumental = paths.local_instrumental.clone();
        let target_wav = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, MixError> {
            let mixed = mixer::mix_files(&vocals, &instrumental)?;
            crate::audio::encode_wav_f32(&mixed).map_err(|e| MixError::Encode(e.to_string()))
        })
        .await
        .map_err(|e| MixError::Task(e.to_string()))??;

        staging.track(&paths.local_final);
        self.masterer
            .master(target_wav, &paths.local_reference, &paths.local_final)
            .await?;

        self.store
            .upload(&paths.local_final, &self.config.bucket, &paths.output_key)
            .await
            .map_err(|source| JobError::Upload {
                key: paths.output_key.clone(),
                source,
            })
    }

    /// Wait for one input and download it into staging
    async fn stage(
        &self,
        asset: Asset,
        paths: &AssetPaths,
        staging: &mut StagingFiles,
    ) -> Result<(), JobError> {
        let bucket = &self.config.bucket;
        let key = paths.remote(asset);
        let local = paths.local(asset);
        let download_err = |source: StorageError| JobError::Download {
            asset,
            key: key.to_string(),
            source,
        };

        let available = storage::wait_until_available(
            self.store.as_ref(),
            bucket,
            key,
            self.config.poll_timeout,
            self.config.poll_interval,
        )
        .await
        .map_err(download_err)?;

        if !available {
            return Err(JobError::AssetUnavailable {
                asset,
                key: key.to_string(),
            });
        }

        staging.track(local);
        self.store
            .download(bucket, key, local)
            .await
            .map_err(download_err)?;
        debug!(asset = asset.name(), path = %local.display(), "Asset staged");
        Ok(())
    }
}
