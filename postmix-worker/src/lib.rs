//! postmix-worker library interface
//!
//! Audio post-processing worker: stages a reference, an instrumental and a
//! vocal stem from object storage, mixes and masters them, uploads the result
//! and reports progress to a webhook.

pub mod api;
pub mod audio;
pub mod error;
pub mod mastering;
pub mod mixer;
pub mod notifier;
pub mod orchestrator;
pub mod storage;

pub use crate::error::{ApiError, ApiResult, JobError};
pub use crate::orchestrator::{JobOutcome, Orchestrator, PipelineConfig};

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tower_http::trace::TraceLayer;
use tracing::info;

use postmix_common::config::WorkerConfig;

use crate::mastering::{CommandMasterer, LevelMatchMasterer, Masterer};
use crate::notifier::{Notifier, WebhookNotifier};
use crate::storage::{HttpObjectStore, LocalObjectStore, ObjectStore};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    /// Serializes envelopes: one job runs at a time
    pub job_lock: Arc<Mutex<()>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    pub jobs_handled: Arc<AtomicU64>,
    /// Last job failure for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            job_lock: Arc::new(Mutex::new(())),
            startup_time: Utc::now(),
            jobs_handled: Arc::new(AtomicU64::new(0)),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::job_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Wire the orchestrator's backends from resolved configuration
pub fn build_orchestrator(config: &WorkerConfig) -> anyhow::Result<Orchestrator> {
    let store: Arc<dyn ObjectStore> = match &config.storage_dir {
        Some(dir) => {
            info!(root = %dir.display(), "Using local directory object store");
            Arc::new(LocalObjectStore::new(dir))
        }
        None => {
            info!(
                endpoint = %config.storage_endpoint,
                region = %config.region_name,
                signed = config.credentials.is_some(),
                "Using S3 object store"
            );
            Arc::new(HttpObjectStore::new(
                &config.storage_endpoint,
                config.region_name.clone(),
                config.credentials.clone(),
            )?)
        }
    };

    let notifier: Arc<dyn Notifier> = Arc::new(WebhookNotifier::new(config.webhook_url.clone())?);

    let masterer: Arc<dyn Masterer> = match config
        .mastering_command
        .as_deref()
        .and_then(CommandMasterer::from_command_line)
    {
        Some(command) => {
            info!(command = ?config.mastering_command, "Using external mastering program");
            Arc::new(command)
        }
        None => Arc::new(LevelMatchMasterer::new()),
    };

    Ok(Orchestrator::new(
        store,
        notifier,
        masterer,
        PipelineConfig {
            bucket: config.bucket_name.clone(),
            staging_dir: config.staging_dir.clone(),
            poll_timeout: config.poll_timeout,
            poll_interval: config.poll_interval,
        },
    ))
}
