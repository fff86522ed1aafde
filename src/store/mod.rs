//! Roomcast Store
//!
//! Durable persistence for chat data:
//!
//! - **types**: Core data structures (Message, Room, RoomId, User)
//! - **sqlite**: SQLite implementation of rooms, users and messages
//! - **error**: Error types
//!
//! The relay only depends on the [`MessageStore`] trait: append a message and
//! read a room's history back oldest first. Everything else (rooms, users) is
//! used by the HTTP layer directly.
//!
//! # Example
//!
//! ```rust,no_run
//! use roomcast::store::{MessageStore, NewMessage, RoomId, SqliteStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = SqliteStore::open(std::path::Path::new("./roomcast.db"))?;
//!     let general = RoomId::parse("general")?;
//!     store.create_room(general.clone()).await?;
//!
//!     let message = store.persist(NewMessage::new(general.clone(), "alice", "hi")).await?;
//!     let history = store.list_by_room(&general).await?;
//!     assert_eq!(history.last(), Some(&message));
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod sqlite;
pub mod types;

pub use error::{StoreError, StoreResult};
pub use sqlite::SqliteStore;
pub use types::{
    now_millis, validate_username, Message, NewMessage, Room, RoomId, User, MAX_BODY_LEN,
    MAX_ROOM_NAME_LEN,
};

use async_trait::async_trait;

/// Message persistence as seen by the relay
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Durably append a message, returning it with its assigned id
    async fn persist(&self, message: NewMessage) -> StoreResult<Message>;

    /// All messages in a room, oldest first
    async fn list_by_room(&self, room: &RoomId) -> StoreResult<Vec<Message>>;
}
