//! Event ingest: turns a repository-push notification into queued jobs.
//!
//! Matching is exact on the stored repository URL. Signature verification is
//! deliberately out of scope here; anyone who can reach this endpoint and
//! knows a registered repository URL can trigger a deploy of that project.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use slipway_core::ProjectId;
use slipway_core::event::PushEvent;
use tracing::info;

use crate::AppState;
use crate::error::ApiError;

pub fn router() -> Router<AppState> {
    Router::new().route("/push", post(handle_push))
}

#[derive(Debug, Serialize)]
struct PushResponse {
    message: &'static str,
    jobs_created: usize,
}

async fn handle_push(
    State(state): State<AppState>,
    Json(event): Json<PushEvent>,
) -> Result<Json<PushResponse>, ApiError> {
    let (repository_url, branch) = event.into_parts()?;

    info!(repo = %repository_url, branch = %branch, "Received push event");

    let projects = state.projects.find_by_repo_url(&repository_url).await?;
    if projects.is_empty() {
        return Err(ApiError::NotFound(format!(
            "no project matches {repository_url}"
        )));
    }

    // One job per matching project, one per invocation.
    let mut jobs_created = 0;
    for project in projects {
        state
            .jobs
            .enqueue(ProjectId::from_uuid(project.id), &branch)
            .await?;
        jobs_created += 1;
        info!(project = %project.name, branch = %branch, "Auto-deploy queued");
    }

    Ok(Json(PushResponse {
        message: "deployment jobs created",
        jobs_created,
    }))
}
