//! # Roomcast
//!
//! Real-time chat relay: authenticated clients join named rooms over
//! WebSockets, and every stored message is fanned out to everyone currently
//! connected to that room.
//!
//! ## Features
//!
//! - **Room-scoped fan-out**: one dispatcher task, per-room ordering
//! - **Slow peers never stall a room**: bounded per-connection queues
//! - **Durable history**: SQLite via `rusqlite`, backlog sent on join
//! - **Token auth**: HS256 JWTs, Argon2 password hashes
//!
//! ## Modules
//!
//! - [`store`]: Rooms, users and message persistence
//! - [`auth`]: Identity verification
//! - [`relay`]: Room registry, dispatcher and session lifecycle
//! - [`api`]: REST + WebSocket server with Axum
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use roomcast::relay::{Dispatcher, RoomRegistry, DEFAULT_INTAKE_CAPACITY};
//! use roomcast::store::{MessageStore, NewMessage, RoomId, SqliteStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = SqliteStore::open_in_memory()?;
//!     let room = store.create_room(RoomId::parse("general")?).await?.name;
//!
//!     let registry = Arc::new(RoomRegistry::default());
//!     let (dispatcher, _task) = Dispatcher::spawn(Arc::clone(&registry), DEFAULT_INTAKE_CAPACITY);
//!
//!     // Persist first, then fan out
//!     let message = store.persist(NewMessage::new(room, "alice", "hello")).await?;
//!     dispatcher.dispatch(message).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod relay;
pub mod store;

// Re-export top-level types for convenience
pub use store::{
    Message, MessageStore, NewMessage, Room, RoomId, SqliteStore, StoreError, StoreResult,
};

pub use auth::{AuthError, IdentityVerifier, JwtAuthority};

pub use relay::{
    ClientFrame, ConnectionId, DispatchHandle, Dispatcher, RoomRegistry, ServerFrame,
    SessionContext, SessionEnd,
};

pub use api::{build_router, serve, ApiError, AppState};

pub use config::{Config, ConfigError, LoggingConfig};
