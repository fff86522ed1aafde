//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.
//! These types are serialized/deserialized to/from JSON, by the server
//! and by `roomcast-cli`.

use serde::{Deserialize, Serialize};

use crate::store::{Message, RoomId};

// ============================================
// AUTH DTOs
// ============================================

/// Signup and login request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

/// Successful login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Bearer token, also set as the `jwt_token` cookie
    pub token: String,
    /// Seconds until the token expires
    pub expires_in: i64,
}

/// Identity behind the presented credential
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthCheckResponse {
    pub username: String,
}

/// Plain acknowledgement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusMessage {
    pub message: String,
}

impl StatusMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ============================================
// ROOM DTOs
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
}

// ============================================
// MESSAGE DTOs
// ============================================

/// Room history, oldest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomMessagesResponse {
    pub room_name: RoomId,
    pub messages: Vec<Message>,
}

/// Post a message over HTTP
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostMessageRequest {
    /// Message text; `content` is accepted for older clients
    #[serde(alias = "content")]
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostMessageResponse {
    pub message: String,
    /// The stored message as it was fanned out
    pub data: Message,
}

// ============================================
// HEALTH DTOs
// ============================================

/// Full health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "healthy" or "degraded"
    pub status: String,
    /// "ok" or "error"
    pub store: String,
    /// Live streaming connections
    pub connections: usize,
    /// Rooms with at least one live connection
    pub active_rooms: usize,
    pub uptime_seconds: u64,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_message_accepts_content_alias() {
        let req: PostMessageRequest = serde_json::from_str(r#"{"content": "hi"}"#).unwrap();
        assert_eq!(req.body, "hi");

        let req: PostMessageRequest = serde_json::from_str(r#"{"body": "hello"}"#).unwrap();
        assert_eq!(req.body, "hello");
    }

    #[test]
    fn test_room_messages_shape() {
        let response = RoomMessagesResponse {
            room_name: RoomId::parse("general").unwrap(),
            messages: Vec::new(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["room_name"], "general");
        assert!(json["messages"].as_array().unwrap().is_empty());
    }
}
