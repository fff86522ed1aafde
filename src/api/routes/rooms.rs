//! Room Routes
//!
//! - GET /api/v1/rooms - List all rooms
//! - POST /api/v1/rooms - Create a room

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::CreateRoomRequest;
use crate::api::error::ApiResult;
use crate::api::extract::AuthUser;
use crate::api::state::AppState;
use crate::store::{Room, RoomId};

/// GET /api/v1/rooms
pub async fn list_rooms(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Room>>> {
    Ok(Json(state.store.list_rooms().await?))
}

/// POST /api/v1/rooms
///
/// Names are validated as room slugs; an existing name is a 409.
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateRoomRequest>,
) -> ApiResult<(StatusCode, Json<Room>)> {
    let name = RoomId::parse(req.name.trim())?;
    let room = state.store.create_room(name).await?;

    tracing::info!(room = %room.name, created_by = %user.username, "Room created");

    Ok((StatusCode::CREATED, Json(room)))
}
