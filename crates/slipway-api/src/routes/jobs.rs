//! Job endpoints for account holders: enqueue and inspect.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use slipway_core::{AccountId, JobId, ProjectId};
use slipway_db::Job;

use crate::AppState;
use crate::error::ApiError;
use crate::extract::AuthAccount;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_jobs).post(create_job))
        .route("/{id}", get(get_job))
}

async fn list_jobs(
    State(state): State<AppState>,
    AuthAccount(account): AuthAccount,
) -> Result<Json<serde_json::Value>, ApiError> {
    let jobs = state
        .jobs
        .list_for_account(AccountId::from_uuid(account.id))
        .await?;
    Ok(Json(serde_json::json!({ "jobs": jobs })))
}

#[derive(Debug, Deserialize)]
struct CreateJobRequest {
    project_id: uuid::Uuid,
    branch: Option<String>,
}

async fn create_job(
    State(state): State<AppState>,
    AuthAccount(account): AuthAccount,
    Json(req): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<Job>), ApiError> {
    // Scoped lookup doubles as the ownership check.
    let project = state
        .projects
        .get(
            ProjectId::from_uuid(req.project_id),
            AccountId::from_uuid(account.id),
        )
        .await?;

    let branch = req
        .branch
        .filter(|b| !b.is_empty())
        .unwrap_or_else(|| state.config.default_branch.clone());

    let job = state
        .jobs
        .enqueue(ProjectId::from_uuid(project.id), &branch)
        .await?;
    Ok((StatusCode::CREATED, Json(job)))
}

async fn get_job(
    State(state): State<AppState>,
    AuthAccount(account): AuthAccount,
    Path(id): Path<uuid::Uuid>,
) -> Result<Json<Job>, ApiError> {
    let job = state
        .jobs
        .get_for_account(JobId::from_uuid(id), AccountId::from_uuid(account.id))
        .await?;
    Ok(Json(job))
}
