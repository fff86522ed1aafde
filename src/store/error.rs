//! Store error types
//!
//! Defines all errors that can occur in the persistence layer.

use thiserror::Error;

/// Errors that can occur in the store
#[derive(Error, Debug)]
pub enum StoreError {
    /// The database could not be reached or the statement failed
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Requested room does not exist
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// A unique name (room or username) is already taken
    #[error("Already exists: {0}")]
    Conflict(String),

    /// A room name or username failed validation
    #[error("Invalid name: {0}")]
    InvalidName(String),

    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        StoreError::Unavailable(format!("store task failed: {}", err))
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
