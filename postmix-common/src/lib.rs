//! # postmix common library
//!
//! Shared code for the postmix worker:
//! - Job records and the queue envelope they arrive in
//! - Track catalog and per-job asset paths
//! - Status events sent to the webhook
//! - Configuration resolution

pub mod config;
pub mod error;
pub mod events;
pub mod job;

pub use error::{Error, Result};
pub use events::{Action, StatusEvent, STAGE};
pub use job::{AssetPaths, Job, QueueEnvelope, QueueRecord, TrackCatalog};
