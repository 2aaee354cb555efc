//! Request extractors for the two bearer-credential schemes.
//!
//! Both resolve the credential to an explicit principal value that handlers
//! take as an argument; nothing about the caller is ambient.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use slipway_core::credential::hash_token;
use slipway_db::{Account, Runner};

use crate::AppState;
use crate::error::ApiError;

/// The account behind an `Authorization: Bearer <api token>` header.
pub struct AuthAccount(pub Account);

/// The runner behind an `Authorization: Bearer <runner token>` header.
pub struct AuthRunner(pub Runner);

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("bearer token required".to_string()))
}

impl FromRequestParts<AppState> for AuthAccount {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let account = state
            .accounts
            .find_by_token_hash(&hash_token(token))
            .await?
            .ok_or_else(|| ApiError::Unauthorized("invalid API token".to_string()))?;
        Ok(AuthAccount(account))
    }
}

impl FromRequestParts<AppState> for AuthRunner {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let runner = state
            .runners
            .find_by_token_hash(&hash_token(token))
            .await?
            .ok_or_else(|| ApiError::Unauthorized("invalid runner token".to_string()))?;
        Ok(AuthRunner(runner))
    }
}
