//! API routes.

pub mod auth;
pub mod health;
pub mod hooks;
pub mod jobs;
pub mod projects;
pub mod runners;
pub mod worker;

use axum::Router;

use crate::AppState;

/// Build the main API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_router())
        .nest("/hooks", hooks::router())
        .merge(health::router())
        .with_state(state)
}

fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/projects", projects::router())
        .nest("/jobs", jobs::router())
        .nest("/runners", runners::router())
        .nest("/worker", worker::router())
}
