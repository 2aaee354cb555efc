//! Account authentication endpoints.
//!
//! API tokens are opaque bearer strings returned by register/login and
//! revoked by logout. Only their hash is stored.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use slipway_core::AccountId;
use slipway_core::credential::{generate_token, hash_password, hash_token, verify_password};
use slipway_db::Account;

use crate::AppState;
use crate::error::ApiError;
use crate::extract::AuthAccount;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

#[derive(Debug, Serialize)]
struct AccountResponse {
    id: String,
    name: String,
    email: String,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id.to_string(),
            name: account.name,
            email: account.email,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    name: String,
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct TokenResponse {
    account: AccountResponse,
    /// Shown here and never again.
    api_token: String,
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    if req.name.is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }
    if !req.email.contains('@') {
        return Err(ApiError::BadRequest("a valid email is required".to_string()));
    }
    if req.password.len() < 8 {
        return Err(ApiError::BadRequest(
            "password must be at least 8 characters".to_string(),
        ));
    }

    let token = generate_token();
    let account = state
        .accounts
        .create(
            &req.name,
            &req.email,
            &hash_password(&req.password),
            &hash_token(&token),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(TokenResponse {
            account: account.into(),
            api_token: token,
        }),
    ))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let account = state
        .accounts
        .find_by_email(&req.email)
        .await?
        .filter(|a| verify_password(&req.password, &a.password_hash))
        .ok_or_else(|| ApiError::Unauthorized("invalid credentials".to_string()))?;

    // Tokens are stored hashed, so login always rotates to a fresh one.
    let token = generate_token();
    state
        .accounts
        .set_token_hash(AccountId::from_uuid(account.id), Some(&hash_token(&token)))
        .await?;

    Ok(Json(TokenResponse {
        account: account.into(),
        api_token: token,
    }))
}

async fn logout(
    State(state): State<AppState>,
    AuthAccount(account): AuthAccount,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .accounts
        .set_token_hash(AccountId::from_uuid(account.id), None)
        .await?;
    Ok(Json(serde_json::json!({ "message": "logged out" })))
}

async fn me(AuthAccount(account): AuthAccount) -> Json<AccountResponse> {
    Json(account.into())
}
