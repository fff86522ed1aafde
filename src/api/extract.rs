//! Request extractors
//!
//! Credentials are read from the `Authorization: Bearer` header first and
//! the `jwt_token` cookie second.

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use std::sync::Arc;

use crate::api::{ApiError, AppState};
use crate::auth::IdentityVerifier;

/// Cookie carrying the session token
pub const AUTH_COOKIE: &str = "jwt_token";

/// Authenticated caller of an HTTP handler
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub username: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = credential_from_headers(&parts.headers)
            .ok_or_else(|| ApiError::Unauthorized("missing credential".to_string()))?;
        let username = state.auth.verify(&token)?;
        Ok(AuthUser { username })
    }
}

/// Find a token in the request headers
pub fn credential_from_headers(headers: &HeaderMap) -> Option<String> {
    bearer_token(headers).or_else(|| cookie_token(headers))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == AUTH_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// `Set-Cookie` value storing `token` for `max_age` seconds
pub fn auth_cookie(token: &str, max_age: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax",
        AUTH_COOKIE, token, max_age
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value clearing the auth cookie
pub fn clear_auth_cookie(secure: bool) -> String {
    auth_cookie("", 0, secure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(header::COOKIE, HeaderValue::from_static("jwt_token=xyz"));

        assert_eq!(credential_from_headers(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn test_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; jwt_token=xyz; lang=en"),
        );

        assert_eq!(credential_from_headers(&headers).as_deref(), Some("xyz"));
    }

    #[test]
    fn test_missing_or_empty_credential() {
        let mut headers = HeaderMap::new();
        assert_eq!(credential_from_headers(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        headers.insert(header::COOKIE, HeaderValue::from_static("jwt_token="));
        assert_eq!(credential_from_headers(&headers), None);
    }

    #[test]
    fn test_cookie_values() {
        let cookie = auth_cookie("tok", 3600, false);
        assert_eq!(cookie, "jwt_token=tok; Max-Age=3600; Path=/; HttpOnly; SameSite=Lax");

        assert!(clear_auth_cookie(true).starts_with("jwt_token=; Max-Age=0"));
        assert!(clear_auth_cookie(true).ends_with("; Secure"));
    }
}
