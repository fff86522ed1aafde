//! Core data types for the Roomcast store
//!
//! - `RoomId`: Validated room name used as the partition key for messages and connections
//! - `NewMessage` / `Message`: A chat message before and after persistence
//! - `Room` and `User`: Records backing the HTTP API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::StoreError;

/// Maximum length of a room name
pub const MAX_ROOM_NAME_LEN: usize = 64;

/// Maximum length of a message body in bytes
pub const MAX_BODY_LEN: usize = 4096;

/// Identifier of a room
///
/// Room names are slugs: 1-64 characters of lowercase ASCII letters,
/// digits, `-` and `_`. The name doubles as the room's primary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Parse and validate a room name
    pub fn parse(name: impl Into<String>) -> Result<Self, StoreError> {
        let name = name.into();

        if name.is_empty() || name.len() > MAX_ROOM_NAME_LEN {
            return Err(StoreError::InvalidName(format!(
                "room name must be 1-{} characters",
                MAX_ROOM_NAME_LEN
            )));
        }

        let valid = name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_');
        if !valid {
            return Err(StoreError::InvalidName(format!(
                "room name '{}' may only contain a-z, 0-9, '-' and '_'",
                name
            )));
        }

        Ok(Self(name))
    }

    /// Borrow the room name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message that has not been persisted yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    /// Display name of the author
    pub author: String,
    /// Message text
    pub body: String,
    /// Room the message was posted to
    pub room: RoomId,
    /// Creation time, set when the message is built
    pub created_at: DateTime<Utc>,
}

impl NewMessage {
    /// Create a new message stamped with the current time
    pub fn new(room: RoomId, author: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            body: body.into(),
            room,
            created_at: now_millis(),
        }
    }

    /// Attach the store-assigned id, producing the persisted form
    pub fn into_message(self, id: i64) -> Message {
        Message {
            id,
            author: self.author,
            body: self.body,
            room: self.room,
            created_at: self.created_at,
        }
    }
}

/// A persisted chat message
///
/// This is the delivery unit written to streaming connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Store-assigned id, increasing in insertion order
    pub id: i64,
    /// Display name of the author
    pub author: String,
    /// Message text
    pub body: String,
    /// Room the message belongs to
    pub room: RoomId,
    /// When the message was created
    pub created_at: DateTime<Utc>,
}

/// A chat room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub name: RoomId,
    pub created_at: DateTime<Utc>,
}

/// A registered user account
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    /// Argon2 PHC string
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Current time truncated to the millisecond precision stored on disk
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// Validate a username for signup
pub fn validate_username(username: &str) -> Result<(), StoreError> {
    if username.len() < 3 || username.len() > 32 {
        return Err(StoreError::InvalidName(
            "username must be 3-32 characters".to_string(),
        ));
    }

    let valid = username
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || b == b'-');
    if !valid {
        return Err(StoreError::InvalidName(format!(
            "username '{}' may only contain letters, digits, '_', '.' and '-'",
            username
        )));
    }

    Ok(())
}
