//! Queue envelope submission

use std::sync::atomic::Ordering;

use axum::{extract::State, routing::post, Json, Router};
use serde::Serialize;
use tracing::info;

use crate::error::ApiResult;
use crate::orchestrator::JobOutcome;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub completed: usize,
    pub failed: usize,
    pub outcomes: Vec<JobOutcome>,
}

/// POST /jobs
///
/// Envelopes are handled one at a time. Job failures are reported in the
/// response and via webhook; only a malformed envelope is rejected (400).
pub async fn submit_envelope(
    State(state): State<AppState>,
    body: String,
) -> ApiResult<Json<SubmitResponse>> {
    let _guard = state.job_lock.lock().await;
    let outcomes = state.orchestrator.handle_message(&body).await?;

    let completed = outcomes.iter().filter(|o| o.is_completed()).count();
    let failed = outcomes.len() - completed;

    state
        .jobs_handled
        .fetch_add(outcomes.len() as u64, Ordering::Relaxed);
    if let Some(JobOutcome::Failed { error, .. }) =
        outcomes.iter().rev().find(|o| !o.is_completed())
    {
        *state.last_error.write().await = Some(error.clone());
    }

    info!(completed, failed, "Envelope handled");

    Ok(Json(SubmitResponse {
        completed,
        failed,
        outcomes,
    }))
}

pub fn job_routes() -> Router<AppState> {
    Router::new().route("/jobs", post(submit_envelope))
}
