//! WebSocket Handler
//!
//! Handles WebSocket upgrade requests for a room and hands the socket to the
//! session lifecycle.

use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    http::HeaderMap,
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;

use super::session::run_session;
use super::transport::{WsTransport, CLOSE_TOKEN_EXPIRED, CLOSE_TOKEN_INVALID};
use crate::api::extract::credential_from_headers;
use crate::api::{ApiError, AppState};
use crate::auth::{AuthError, IdentityVerifier};
use crate::store::RoomId;

/// Query parameters accepted on the upgrade request
#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// GET /api/v1/rooms/:room/ws
///
/// Unknown rooms are refused with 404 before upgrading. A bad or missing
/// credential still upgrades, then closes with 4001 (expired) or 4002
/// (invalid) so browser clients can see the reason.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(room): Path<String>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let room = RoomId::parse(room).map_err(|e| ApiError::NotFound(e.to_string()))?;
    if state.store.get_room(&room).await?.is_none() {
        return Err(ApiError::NotFound(format!("Room '{}'", room)));
    }

    let verified = match query.token.or_else(|| credential_from_headers(&headers)) {
        Some(credential) => state.auth.verify(&credential),
        None => Err(AuthError::InvalidCredential),
    };

    let author = match verified {
        Ok(author) => author,
        Err(err) => {
            let (code, reason) = match err {
                AuthError::Expired => (CLOSE_TOKEN_EXPIRED, "Token expired"),
                _ => (CLOSE_TOKEN_INVALID, "Token invalid"),
            };
            tracing::warn!(room = %room, error = %err, "Rejecting unauthenticated WebSocket");
            return Ok(ws.on_upgrade(move |socket| async move {
                WsTransport::new(socket).close_with(code, reason).await;
            }));
        }
    };

    let ctx = state.session_context();
    Ok(ws.on_upgrade(move |socket| async move {
        run_session(WsTransport::new(socket), room, author, ctx).await;
    }))
}
