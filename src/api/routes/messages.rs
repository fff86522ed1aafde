//! Room Message Routes
//!
//! - GET /api/v1/rooms/:room/messages - Room history, oldest first
//! - POST /api/v1/rooms/:room/messages - Persist and fan out a message

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::api::dto::{PostMessageRequest, PostMessageResponse, RoomMessagesResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::AuthUser;
use crate::api::state::AppState;
use crate::store::{MessageStore, NewMessage, RoomId, MAX_BODY_LEN};

/// GET /api/v1/rooms/:room/messages
pub async fn get_messages(
    State(state): State<Arc<AppState>>,
    Path(room): Path<String>,
) -> ApiResult<Json<RoomMessagesResponse>> {
    let room = existing_room(&state, room).await?;
    let messages = state.store.list_by_room(&room).await?;

    Ok(Json(RoomMessagesResponse {
        room_name: room,
        messages,
    }))
}

/// POST /api/v1/rooms/:room/messages
///
/// The message is persisted before it is dispatched. If the store rejects
/// it, nothing is fanned out. A stopped dispatcher is a 503 and nothing is
/// stored. A stored message succeeds even when nobody is
/// connected to the room.
pub async fn post_message(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(room): Path<String>,
    Json(req): Json<PostMessageRequest>,
) -> ApiResult<Json<PostMessageResponse>> {
    if req.body.trim().is_empty() {
        return Err(ApiError::Validation(
            "Message content cannot be empty".to_string(),
        ));
    }
    if req.body.len() > MAX_BODY_LEN {
        return Err(ApiError::Validation(format!(
            "Message body exceeds {} bytes",
            MAX_BODY_LEN
        )));
    }

    let room = existing_room(&state, room).await?;
    if state.dispatcher.is_closed() {
        return Err(ApiError::ServiceUnavailable(
            "Relay is not accepting messages".to_string(),
        ));
    }

    let stored = state
        .store
        .persist(NewMessage::new(room, user.username, req.body))
        .await?;

    if let Err(e) = state.dispatcher.dispatch(stored.clone()).await {
        tracing::error!(message_id = stored.id, error = %e, "Stored message was not dispatched");
    }

    Ok(Json(PostMessageResponse {
        message: "Message sent successfully".to_string(),
        data: stored,
    }))
}

async fn existing_room(state: &AppState, room: String) -> ApiResult<RoomId> {
    let room = RoomId::parse(room).map_err(|e| ApiError::NotFound(e.to_string()))?;
    match state.store.get_room(&room).await? {
        Some(_) => Ok(room),
        None => Err(ApiError::NotFound(format!("Room '{}'", room))),
    }
}
