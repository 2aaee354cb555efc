//! Runner-facing endpoints: poll, claim, report, heartbeat.
//!
//! Dispatch is pull-based. A runner polls for the oldest unclaimed job,
//! claims it by id, then reports status transitions and log output for the
//! job it owns. Losing a claim is a normal outcome, answered with 409; the
//! runner's poll loop is the retry mechanism.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use slipway_core::{JobId, JobStatus, RunnerId};
use slipway_db::Job;

use crate::AppState;
use crate::error::ApiError;
use crate::extract::AuthRunner;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/jobs", get(poll_jobs))
        .route("/jobs/{id}/claim", post(claim_job))
        .route("/jobs/{id}/status", post(update_status))
        .route("/jobs/{id}/logs", post(append_logs))
        .route("/heartbeat", post(heartbeat))
}

/// Fetch the next available job, or null. Polling doubles as a liveness
/// signal.
async fn poll_jobs(
    State(state): State<AppState>,
    AuthRunner(runner): AuthRunner,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .runners
        .heartbeat(RunnerId::from_uuid(runner.id))
        .await?;

    let job = state.jobs.next_available().await?;
    Ok(Json(serde_json::json!({ "job": job })))
}

async fn claim_job(
    State(state): State<AppState>,
    AuthRunner(runner): AuthRunner,
    Path(id): Path<uuid::Uuid>,
) -> Result<Json<Job>, ApiError> {
    let job = state
        .jobs
        .claim(JobId::from_uuid(id), RunnerId::from_uuid(runner.id))
        .await?;

    tracing::info!(job_id = %job.id, runner_id = %runner.id, "Job claimed");
    Ok(Json(job))
}

#[derive(Debug, Deserialize)]
struct UpdateStatusRequest {
    status: String,
    logs: Option<String>,
}

async fn update_status(
    State(state): State<AppState>,
    AuthRunner(runner): AuthRunner,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Job>, ApiError> {
    let status: JobStatus = req.status.parse()?;
    if !status.is_reportable() {
        return Err(ApiError::BadRequest(format!(
            "status must be one of: running, completed, failed (got {status})"
        )));
    }

    let job = state
        .jobs
        .update_status(
            JobId::from_uuid(id),
            RunnerId::from_uuid(runner.id),
            status,
            req.logs.as_deref(),
        )
        .await?;

    tracing::info!(job_id = %job.id, status = %job.status, "Job status updated");
    Ok(Json(job))
}

#[derive(Debug, Deserialize)]
struct AppendLogsRequest {
    logs: String,
}

async fn append_logs(
    State(state): State<AppState>,
    AuthRunner(runner): AuthRunner,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<AppendLogsRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if req.logs.is_empty() {
        return Err(ApiError::BadRequest("logs is required".to_string()));
    }

    state
        .jobs
        .append_logs(
            JobId::from_uuid(id),
            RunnerId::from_uuid(runner.id),
            &req.logs,
        )
        .await?;
    Ok(Json(serde_json::json!({ "message": "logs appended" })))
}

async fn heartbeat(
    State(state): State<AppState>,
    AuthRunner(runner): AuthRunner,
) -> Result<Json<serde_json::Value>, ApiError> {
    let runner = state
        .runners
        .heartbeat(RunnerId::from_uuid(runner.id))
        .await?;
    Ok(Json(serde_json::json!({
        "message": "heartbeat received",
        "last_seen_at": runner.last_seen_at,
    })))
}
