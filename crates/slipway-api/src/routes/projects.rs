//! Project management endpoints (account-scoped).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use slipway_core::{AccountId, ProjectId};
use slipway_db::{NewProject, Project, ProjectPatch};
use url::Url;

use crate::AppState;
use crate::error::ApiError;
use crate::extract::AuthAccount;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_projects).post(create_project))
        .route(
            "/{id}",
            get(get_project).put(update_project).delete(delete_project),
        )
}

const FRAMEWORKS: &[&str] = &["laravel", "nextjs"];
const TARGETS: &[&str] = &["vps", "cpanel"];

fn validate_repo_url(repo_url: &str) -> Result<(), ApiError> {
    Url::parse(repo_url)
        .map_err(|_| ApiError::BadRequest("repo_url must be a valid URL".to_string()))?;
    Ok(())
}

fn validate_choice(field: &str, value: &str, allowed: &[&str]) -> Result<(), ApiError> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "{field} must be one of: {}",
            allowed.join(", ")
        )))
    }
}

async fn list_projects(
    State(state): State<AppState>,
    AuthAccount(account): AuthAccount,
) -> Result<Json<serde_json::Value>, ApiError> {
    let projects = state.projects.list(AccountId::from_uuid(account.id)).await?;
    Ok(Json(serde_json::json!({ "projects": projects })))
}

#[derive(Debug, Deserialize)]
struct CreateProjectRequest {
    name: String,
    repo_url: String,
    framework: String,
    target: String,
}

async fn create_project(
    State(state): State<AppState>,
    AuthAccount(account): AuthAccount,
    Json(req): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    if req.name.is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }
    validate_repo_url(&req.repo_url)?;
    validate_choice("framework", &req.framework, FRAMEWORKS)?;
    validate_choice("target", &req.target, TARGETS)?;

    let project = state
        .projects
        .create(
            AccountId::from_uuid(account.id),
            NewProject {
                name: req.name,
                repo_url: req.repo_url,
                framework: req.framework,
                target: req.target,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(project)))
}

async fn get_project(
    State(state): State<AppState>,
    AuthAccount(account): AuthAccount,
    Path(id): Path<uuid::Uuid>,
) -> Result<Json<Project>, ApiError> {
    let project = state
        .projects
        .get(ProjectId::from_uuid(id), AccountId::from_uuid(account.id))
        .await?;
    Ok(Json(project))
}

#[derive(Debug, Deserialize)]
struct UpdateProjectRequest {
    name: Option<String>,
    repo_url: Option<String>,
    framework: Option<String>,
    target: Option<String>,
}

async fn update_project(
    State(state): State<AppState>,
    AuthAccount(account): AuthAccount,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<UpdateProjectRequest>,
) -> Result<Json<Project>, ApiError> {
    if let Some(repo_url) = &req.repo_url {
        validate_repo_url(repo_url)?;
    }
    if let Some(framework) = &req.framework {
        validate_choice("framework", framework, FRAMEWORKS)?;
    }
    if let Some(target) = &req.target {
        validate_choice("target", target, TARGETS)?;
    }

    let project = state
        .projects
        .update(
            ProjectId::from_uuid(id),
            AccountId::from_uuid(account.id),
            ProjectPatch {
                name: req.name,
                repo_url: req.repo_url,
                framework: req.framework,
                target: req.target,
            },
        )
        .await?;
    Ok(Json(project))
}

async fn delete_project(
    State(state): State<AppState>,
    AuthAccount(account): AuthAccount,
    Path(id): Path<uuid::Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .projects
        .delete(ProjectId::from_uuid(id), AccountId::from_uuid(account.id))
        .await?;
    Ok(Json(serde_json::json!({ "message": "project deleted" })))
}
