//! Relay Frame Types
//!
//! Defines the JSON frames exchanged over a room's streaming connection.

use serde::{Deserialize, Serialize};

use crate::store::{Message, RoomId};

/// Frames sent from client to server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Post a message to the connection's room
    Message {
        /// Message text
        body: String,
    },
    /// Ping for keepalive
    Ping,
    /// Leave the room and close the connection
    Logout,
}

/// Frames sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Connection registered in its room
    Connected {
        /// Unique connection identifier
        connection_id: String,
        /// Room this connection belongs to
        room: RoomId,
        /// Display name the connection posts as
        author: String,
    },
    /// Room backlog, oldest first, sent once after `Connected`
    History {
        messages: Vec<Message>,
    },
    /// A message posted to the room
    Message(Message),
    /// Validation feedback for this connection only
    Notice {
        message: String,
    },
    /// Error description
    Error {
        message: String,
    },
    /// Pong response to ping
    Pong,
}

impl ServerFrame {
    /// Id of the carried message, if this frame is a live message
    pub fn message_id(&self) -> Option<i64> {
        match self {
            ServerFrame::Message(message) => Some(message.id),
            _ => None,
        }
    }

    pub fn notice(message: impl Into<String>) -> Self {
        ServerFrame::Notice {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerFrame::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NewMessage;

    #[test]
    fn test_client_frame_deserialize_message() {
        let json = r#"{"type": "message", "body": "hi there"}"#;
        let frame: ClientFrame = serde_json::from_str(json).unwrap();
        match frame {
            ClientFrame::Message { body } => assert_eq!(body, "hi there"),
            _ => panic!("Expected Message"),
        }
    }

    #[test]
    fn test_client_frame_deserialize_logout_and_ping() {
        let frame: ClientFrame = serde_json::from_str(r#"{"type": "logout"}"#).unwrap();
        assert!(matches!(frame, ClientFrame::Logout));

        let frame: ClientFrame = serde_json::from_str(r#"{"type": "ping"}"#).unwrap();
        assert!(matches!(frame, ClientFrame::Ping));
    }

    #[test]
    fn test_client_frame_rejects_malformed() {
        assert!(serde_json::from_str::<ClientFrame>("not json").is_err());
        assert!(serde_json::from_str::<ClientFrame>(r#"{"type": "message"}"#).is_err());
        assert!(serde_json::from_str::<ClientFrame>(r#"{"type": "subscribe"}"#).is_err());
        assert!(serde_json::from_str::<ClientFrame>(r#"{"content": "hi"}"#).is_err());
    }

    #[test]
    fn test_server_frame_serialize_message() {
        let room = RoomId::parse("general").unwrap();
        let message = NewMessage::new(room, "alice", "hi").into_message(7);
        let frame = ServerFrame::Message(message);

        let json: serde_json::Value = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "message");
        assert_eq!(json["id"], 7);
        assert_eq!(json["author"], "alice");
        assert_eq!(json["body"], "hi");
        assert_eq!(json["room"], "general");
        assert!(json["created_at"].is_string());
        assert_eq!(frame.message_id(), Some(7));
    }

    #[test]
    fn test_server_frame_serialize_connected() {
        let frame = ServerFrame::Connected {
            connection_id: "abc-123".to_string(),
            room: RoomId::parse("general").unwrap(),
            author: "alice".to_string(),
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("\"type\":\"connected\""));
        assert!(json.contains("\"connection_id\":\"abc-123\""));
        assert_eq!(frame.message_id(), None);
    }

    #[test]
    fn test_server_frame_parses_back() {
        let frame = ServerFrame::notice("Message body cannot be empty");
        let json = serde_json::to_string(&frame).unwrap();
        let parsed: ServerFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, frame);
    }
}
