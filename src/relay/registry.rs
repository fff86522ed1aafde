//! Room Registry
//!
//! Tracks which live connections belong to which room. The map is the only
//! shared mutable structure in the relay: it is mutated through
//! [`RoomRegistry::register`] / [`RoomRegistry::deregister`] and read through
//! [`RoomRegistry::members_of`], which hands out an owned snapshot. The lock is
//! only held for the map operation itself, never while writing to a
//! connection.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Notify, RwLock};
use uuid::Uuid;

use super::frames::ServerFrame;
use crate::store::RoomId;

/// Unique identifier for a streaming connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Configuration for the room registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum number of concurrent connections across all rooms
    pub max_connections: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_connections: 1000,
        }
    }
}

/// Why a frame could not be handed to a connection
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("connection outbound queue is full")]
    Full,

    #[error("connection is closed")]
    Closed,
}

/// Registry-side handle for one connection
///
/// Cheap to clone. Frames pushed through [`ConnectionHandle::try_deliver`]
/// land in a bounded queue drained by the connection's session task;
/// [`ConnectionHandle::close`] asks that task to shut the transport down.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    room: RoomId,
    author: String,
    outbound: mpsc::Sender<Arc<ServerFrame>>,
    close_signal: Arc<Notify>,
}

/// Session-side end of a connection: the outbound queue and the close signal
#[derive(Debug)]
pub struct ConnectionInbox {
    frames: mpsc::Receiver<Arc<ServerFrame>>,
    close_signal: Arc<Notify>,
}

impl ConnectionHandle {
    /// Create a handle bound to `room` with an outbound queue of `buffer` frames
    pub fn new(room: RoomId, author: impl Into<String>, buffer: usize) -> (Self, ConnectionInbox) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let close_signal = Arc::new(Notify::new());

        let handle = Self {
            id: ConnectionId::new(),
            room,
            author: author.into(),
            outbound: tx,
            close_signal: Arc::clone(&close_signal),
        };
        let inbox = ConnectionInbox {
            frames: rx,
            close_signal,
        };

        (handle, inbox)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    /// Queue a frame without waiting
    pub fn try_deliver(&self, frame: Arc<ServerFrame>) -> Result<(), DeliveryError> {
        self.outbound.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Ask the owning session to close its transport
    pub fn close(&self) {
        self.close_signal.notify_one();
    }

    /// Whether the session side has gone away
    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }
}

impl ConnectionInbox {
    /// Next queued frame
    pub async fn recv(&mut self) -> Option<Arc<ServerFrame>> {
        self.frames.recv().await
    }

    /// Next queued frame, if one is ready
    pub fn try_recv(&mut self) -> Option<Arc<ServerFrame>> {
        self.frames.try_recv().ok()
    }

    /// Resolves once [`ConnectionHandle::close`] has been called
    pub async fn closed(&self) {
        self.close_signal.notified().await;
    }

    /// The close signal, for waiting on it while the queue is borrowed
    pub fn close_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.close_signal)
    }
}

/// Errors that can occur when registering a connection
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Too many connections (limit: {0})")]
    TooManyConnections(usize),

    #[error("Connection is bound to room '{bound}', not '{requested}'")]
    RoomMismatch { bound: RoomId, requested: RoomId },
}

#[derive(Default)]
struct RegistryInner {
    /// Room → (ConnectionId → handle)
    rooms: HashMap<RoomId, HashMap<ConnectionId, ConnectionHandle>>,
    /// Total connections across all rooms
    total: usize,
}

/// Concurrency-safe room → connection-set mapping
pub struct RoomRegistry {
    inner: RwLock<RegistryInner>,
    config: RegistryConfig,
}

impl RoomRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
            config,
        }
    }

    /// Add a connection to a room's member set
    ///
    /// Registering the same connection again replaces the existing entry.
    pub async fn register(
        &self,
        room: &RoomId,
        connection: ConnectionHandle,
    ) -> Result<(), RegistryError> {
        if connection.room() != room {
            return Err(RegistryError::RoomMismatch {
                bound: connection.room().clone(),
                requested: room.clone(),
            });
        }

        let id = connection.id();
        let mut inner = self.inner.write().await;

        let already_present = inner
            .rooms
            .get(room)
            .map(|members| members.contains_key(&id))
            .unwrap_or(false);

        if !already_present && inner.total >= self.config.max_connections {
            return Err(RegistryError::TooManyConnections(self.config.max_connections));
        }

        inner
            .rooms
            .entry(room.clone())
            .or_default()
            .insert(id, connection);
        if !already_present {
            inner.total += 1;
        }

        tracing::info!(connection_id = %id, room = %room, "Connection registered");
        Ok(())
    }

    /// Remove a connection from a room's member set
    ///
    /// Returns whether the connection was present. Absence is not an error:
    /// a session and the dispatcher may both try to remove the same member.
    pub async fn deregister(&self, room: &RoomId, id: &ConnectionId) -> bool {
        let mut inner = self.inner.write().await;

        let removed = match inner.rooms.get_mut(room) {
            Some(members) => {
                let removed = members.remove(id).is_some();
                if members.is_empty() {
                    inner.rooms.remove(room);
                }
                removed
            }
            None => false,
        };

        if removed {
            inner.total -= 1;
            tracing::info!(connection_id = %id, room = %room, "Connection deregistered");
        }
        removed
    }

    /// Snapshot of a room's current members
    ///
    /// Unknown rooms yield an empty snapshot.
    pub async fn members_of(&self, room: &RoomId) -> Vec<ConnectionHandle> {
        self.inner
            .read()
            .await
            .rooms
            .get(room)
            .map(|members| members.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of connections in a room
    pub async fn room_size(&self, room: &RoomId) -> usize {
        self.inner
            .read()
            .await
            .rooms
            .get(room)
            .map(|members| members.len())
            .unwrap_or(0)
    }

    /// Total live connections
    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.total
    }

    /// Rooms with at least one live connection
    pub async fn room_count(&self) -> usize {
        self.inner.read().await.rooms.len()
    }

    /// Close every connection and clear the map
    pub async fn shutdown(&self) {
        let drained = {
            let mut inner = self.inner.write().await;
            inner.total = 0;
            std::mem::take(&mut inner.rooms)
        };

        let mut closed = 0;
        for connection in drained.into_values().flat_map(|members| members.into_values()) {
            connection.close();
            closed += 1;
        }

        tracing::info!(connections = closed, "Room registry shut down");
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}
