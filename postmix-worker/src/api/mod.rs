//! HTTP host for queue messages
//!
//! - `POST /jobs`: handle one queue envelope, records in order
//! - `GET /health`: liveness and diagnostics

mod health;
mod jobs;

pub use health::{health_check, health_routes, HealthResponse};
pub use jobs::{job_routes, submit_envelope, SubmitResponse};
