//! Runner registration endpoints (account-scoped).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use slipway_core::{AccountId, RunnerId};
use slipway_db::Runner;

use crate::AppState;
use crate::error::ApiError;
use crate::extract::AuthAccount;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_runners).post(register_runner))
        .route("/{id}", axum::routing::delete(delete_runner))
}

/// Runner as shown to its owner. Status is the liveness view derived from
/// the last heartbeat; the credential never appears.
#[derive(Debug, Serialize)]
struct RunnerResponse {
    id: String,
    name: String,
    status: String,
    last_seen_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl RunnerResponse {
    fn from_runner(runner: Runner, now: DateTime<Utc>, threshold: chrono::Duration) -> Self {
        let status = runner.observed_status(now, threshold).to_string();
        Self {
            id: runner.id.to_string(),
            name: runner.name,
            status,
            last_seen_at: runner.last_seen_at,
            created_at: runner.created_at,
        }
    }
}

async fn list_runners(
    State(state): State<AppState>,
    AuthAccount(account): AuthAccount,
) -> Result<Json<serde_json::Value>, ApiError> {
    let now = Utc::now();
    let threshold = state.config.runner_offline_after;
    let runners: Vec<RunnerResponse> = state
        .runners
        .list(AccountId::from_uuid(account.id))
        .await?
        .into_iter()
        .map(|r| RunnerResponse::from_runner(r, now, threshold))
        .collect();
    Ok(Json(serde_json::json!({ "runners": runners })))
}

#[derive(Debug, Deserialize)]
struct RegisterRunnerRequest {
    name: String,
}

#[derive(Debug, Serialize)]
struct RegisterRunnerResponse {
    runner: RunnerResponse,
    /// The bearer credential, shown only in this response.
    token: String,
}

async fn register_runner(
    State(state): State<AppState>,
    AuthAccount(account): AuthAccount,
    Json(req): Json<RegisterRunnerRequest>,
) -> Result<(StatusCode, Json<RegisterRunnerResponse>), ApiError> {
    if req.name.is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }

    let token = slipway_core::credential::generate_token();
    let runner = state
        .runners
        .create(
            AccountId::from_uuid(account.id),
            &req.name,
            &slipway_core::credential::hash_token(&token),
        )
        .await?;

    tracing::info!(runner_id = %runner.id, name = %runner.name, "Runner registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterRunnerResponse {
            runner: RunnerResponse::from_runner(
                runner,
                Utc::now(),
                state.config.runner_offline_after,
            ),
            token,
        }),
    ))
}

async fn delete_runner(
    State(state): State<AppState>,
    AuthAccount(account): AuthAccount,
    Path(id): Path<uuid::Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .runners
        .delete(RunnerId::from_uuid(id), AccountId::from_uuid(account.id))
        .await?;
    Ok(Json(serde_json::json!({ "message": "runner deleted" })))
}
