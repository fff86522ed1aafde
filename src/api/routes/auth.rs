//! Auth Routes
//!
//! - POST /api/v1/auth/signup - Create an account
//! - POST /api/v1/auth/login - Exchange credentials for a token
//! - POST /api/v1/auth/logout - Clear the auth cookie
//! - GET /api/v1/auth/check - Who am I

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::api::dto::{AuthCheckResponse, CredentialsRequest, StatusMessage, TokenResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::{auth_cookie, clear_auth_cookie, AuthUser};
use crate::api::state::AppState;
use crate::auth::{hash_password, verify_password};
use crate::store::validate_username;

/// Shortest accepted password
pub const MIN_PASSWORD_LEN: usize = 8;

/// POST /api/v1/auth/signup
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CredentialsRequest>,
) -> ApiResult<(StatusCode, Json<StatusMessage>)> {
    validate_username(&req.username)?;
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    // Argon2 is CPU-bound
    let password = req.password;
    let hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    let user = state.store.create_user(&req.username, &hash).await?;
    tracing::info!(username = %user.username, "User created");

    Ok((
        StatusCode::CREATED,
        Json(StatusMessage::new("User created successfully")),
    ))
}

/// POST /api/v1/auth/login
///
/// Returns the token in the body and as the `jwt_token` cookie.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CredentialsRequest>,
) -> ApiResult<impl IntoResponse> {
    let invalid = || ApiError::Unauthorized("Invalid username or password".to_string());

    let user = state
        .store
        .find_user(&req.username)
        .await?
        .ok_or_else(invalid)?;

    let password = req.password;
    let hash = user.password_hash.clone();
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;
    if !matches {
        return Err(invalid());
    }

    let token = state.auth.issue(&user.username)?;
    let expires_in = state.auth.ttl().num_seconds();
    let cookie = auth_cookie(&token, expires_in, state.config.secure_cookies);

    tracing::info!(username = %user.username, "User logged in");

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(TokenResponse { token, expires_in }),
    ))
}

/// POST /api/v1/auth/logout
pub async fn logout(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::SET_COOKIE, clear_auth_cookie(state.config.secure_cookies))],
        Json(StatusMessage::new("Logged out")),
    )
}

/// GET /api/v1/auth/check
pub async fn check(user: AuthUser) -> Json<AuthCheckResponse> {
    Json(AuthCheckResponse {
        username: user.username,
    })
}
