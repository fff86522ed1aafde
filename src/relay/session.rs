//! Session Lifecycle
//!
//! Owns one streaming connection from registration to close:
//!
//! ```text
//! Connecting ──register──▶ Registered ──read error / close / logout──▶ Deregistering ──▶ Terminal
//!                              │  ▲
//!                              └──┘ message persisted + dispatched, or empty-body notice
//! ```
//!
//! Identity is verified before a session starts (at upgrade time), so a
//! session always begins in `Connecting` with a known author. One task runs
//! the whole lifecycle: it waits on inbound frames, drains the frames the
//! dispatcher queued for it, and watches the close signal.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::dispatcher::DispatchHandle;
use super::frames::{ClientFrame, ServerFrame};
use super::registry::{ConnectionHandle, ConnectionInbox, RoomRegistry};
use super::transport::{Transport, TransportError};
use crate::store::types::MAX_BODY_LEN;
use crate::store::{MessageStore, NewMessage, RoomId};

/// Default capacity of each connection's outbound queue
pub const DEFAULT_OUTBOUND_BUFFER: usize = 64;

/// Stand-in deadline when no idle timeout is configured
const NO_IDLE_TIMEOUT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Shared collaborators every session needs
#[derive(Clone)]
pub struct SessionContext {
    pub registry: Arc<RoomRegistry>,
    pub dispatcher: DispatchHandle,
    pub store: Arc<dyn MessageStore>,
    /// Capacity of each connection's outbound queue
    pub outbound_buffer: usize,
    /// Close connections that send nothing for this long
    pub idle_timeout: Option<Duration>,
}

/// Lifecycle state of one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Registered,
    Deregistering,
    Terminal,
}

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Registry refused the connection
    Rejected(String),
    /// Peer closed the transport
    PeerClosed,
    /// Client sent a logout frame
    Logout,
    /// Reading failed with a protocol error
    ReadFailed(String),
    /// Writing to the peer failed
    WriteFailed,
    /// Client sent a frame that is not valid JSON for this protocol
    Malformed,
    /// The registry or dispatcher closed this connection
    Evicted,
    /// No inbound frame within the idle timeout
    IdleTimeout,
    /// The dispatcher is no longer accepting messages
    DispatcherStopped,
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::Rejected(reason) => write!(f, "rejected: {}", reason),
            SessionEnd::PeerClosed => f.write_str("peer closed"),
            SessionEnd::Logout => f.write_str("logout"),
            SessionEnd::ReadFailed(e) => write!(f, "read failed: {}", e),
            SessionEnd::WriteFailed => f.write_str("write failed"),
            SessionEnd::Malformed => f.write_str("malformed frame"),
            SessionEnd::Evicted => f.write_str("evicted"),
            SessionEnd::IdleTimeout => f.write_str("idle timeout"),
            SessionEnd::DispatcherStopped => f.write_str("dispatcher stopped"),
        }
    }
}

/// One connection's lifecycle
pub struct Session<T: Transport> {
    transport: T,
    handle: ConnectionHandle,
    ctx: SessionContext,
    state: SessionState,
    /// Highest message id already sent as backlog
    backlog_high_water: Option<i64>,
}

/// Run a session to completion for an authenticated author
///
/// The connection is registered before the backlog is loaded and written,
/// so no live message can fall between history and the live stream. Live
/// frames queue in the outbound buffer until the greeting is written; a
/// joiner on a slow socket in a busy room can fill `outbound_buffer` in that
/// window and is then evicted like any other slow member.
pub async fn run_session<T: Transport>(
    transport: T,
    room: RoomId,
    author: String,
    ctx: SessionContext,
) -> SessionEnd {
    let (handle, inbox) = ConnectionHandle::new(room, author, ctx.outbound_buffer);
    let session = Session {
        transport,
        handle,
        ctx,
        state: SessionState::Connecting,
        backlog_high_water: None,
    };
    session.run(inbox).await
}

impl<T: Transport> Session<T> {
    async fn run(mut self, mut inbox: ConnectionInbox) -> SessionEnd {
        let id = self.handle.id();
        let room = self.handle.room().clone();

        if let Err(e) = self.ctx.registry.register(&room, self.handle.clone()).await {
            tracing::warn!(connection_id = %id, room = %room, error = %e, "Registration refused");
            let _ = self.send(&ServerFrame::error(e.to_string())).await;
            self.transport.close().await;
            self.transition(SessionState::Terminal);
            return SessionEnd::Rejected(e.to_string());
        }
        self.transition(SessionState::Registered);

        let end = match self.greet().await {
            Ok(()) => self.event_loop(&mut inbox).await,
            Err(_) => SessionEnd::WriteFailed,
        };

        self.transition(SessionState::Deregistering);
        self.ctx.registry.deregister(&room, &id).await;
        self.transport.close().await;
        self.transition(SessionState::Terminal);

        tracing::info!(
            connection_id = %id,
            room = %room,
            author = %self.handle.author(),
            reason = %end,
            "Session ended"
        );
        end
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(
            connection_id = %self.handle.id(),
            from = ?self.state,
            to = ?next,
            "Session state change"
        );
        self.state = next;
    }

    /// Send the connected frame followed by the room backlog
    async fn greet(&mut self) -> Result<(), TransportError> {
        let connected = ServerFrame::Connected {
            connection_id: self.handle.id().to_string(),
            room: self.handle.room().clone(),
            author: self.handle.author().to_string(),
        };
        self.send(&connected).await?;

        match self.ctx.store.list_by_room(self.handle.room()).await {
            Ok(messages) => {
                self.backlog_high_water = messages.iter().map(|m| m.id).max();
                self.send(&ServerFrame::History { messages }).await?;
            }
            Err(e) => {
                tracing::warn!(
                    connection_id = %self.handle.id(),
                    error = %e,
                    "Failed to load room history"
                );
                self.send(&ServerFrame::error("History unavailable")).await?;
            }
        }

        Ok(())
    }

    async fn event_loop(&mut self, inbox: &mut ConnectionInbox) -> SessionEnd {
        let idle_timeout = self.ctx.idle_timeout;
        let idle = tokio::time::sleep(idle_timeout.unwrap_or(NO_IDLE_TIMEOUT));
        tokio::pin!(idle);
        let close_signal = inbox.close_signal();

        loop {
            tokio::select! {
                _ = close_signal.notified() => {
                    return SessionEnd::Evicted;
                }
                frame = inbox.recv() => {
                    let Some(frame) = frame else {
                        return SessionEnd::Evicted;
                    };
                    if self.is_backlog_duplicate(&frame) {
                        continue;
                    }
                    if self.send(&frame).await.is_err() {
                        return SessionEnd::WriteFailed;
                    }
                }
                read = self.transport.read_frame() => {
                    if let Some(timeout) = idle_timeout {
                        idle.as_mut().reset(Instant::now() + timeout);
                    }
                    match read {
                        Ok(text) => {
                            if let Some(end) = self.handle_text(&text).await {
                                return end;
                            }
                        }
                        Err(TransportError::Closed) => return SessionEnd::PeerClosed,
                        Err(TransportError::Protocol(e)) => return SessionEnd::ReadFailed(e),
                    }
                }
                _ = &mut idle, if idle_timeout.is_some() => {
                    let _ = self.send(&ServerFrame::notice("Idle timeout")).await;
                    return SessionEnd::IdleTimeout;
                }
            }
        }
    }

    /// Live messages already covered by the backlog are skipped
    fn is_backlog_duplicate(&self, frame: &ServerFrame) -> bool {
        match (frame.message_id(), self.backlog_high_water) {
            (Some(id), Some(high_water)) => id <= high_water,
            _ => false,
        }
    }

    /// Handle one inbound text frame; `Some` ends the session
    async fn handle_text(&mut self, text: &str) -> Option<SessionEnd> {
        if text.trim().is_empty() {
            let notice = ServerFrame::notice("Message body cannot be empty");
            return self.send(&notice).await.err().map(|_| SessionEnd::WriteFailed);
        }

        let frame = match serde_json::from_str::<ClientFrame>(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(
                    connection_id = %self.handle.id(),
                    error = %e,
                    "Invalid client frame"
                );
                let _ = self
                    .send(&ServerFrame::error(format!("Invalid message format: {}", e)))
                    .await;
                return Some(SessionEnd::Malformed);
            }
        };

        let result = match frame {
            ClientFrame::Ping => self.send(&ServerFrame::Pong).await,
            ClientFrame::Logout => return Some(SessionEnd::Logout),
            ClientFrame::Message { body } => return self.post(body).await,
        };

        result.err().map(|_| SessionEnd::WriteFailed)
    }

    /// Persist a message from this connection and hand it to the dispatcher
    async fn post(&mut self, body: String) -> Option<SessionEnd> {
        if body.trim().is_empty() {
            let notice = ServerFrame::notice("Message body cannot be empty");
            return self.send(&notice).await.err().map(|_| SessionEnd::WriteFailed);
        }
        if body.len() > MAX_BODY_LEN {
            let notice = ServerFrame::notice(format!(
                "Message body exceeds {} bytes",
                MAX_BODY_LEN
            ));
            return self.send(&notice).await.err().map(|_| SessionEnd::WriteFailed);
        }

        let new_message = NewMessage::new(
            self.handle.room().clone(),
            self.handle.author(),
            body,
        );

        let message = match self.ctx.store.persist(new_message).await {
            Ok(message) => message,
            Err(e) => {
                tracing::error!(
                    connection_id = %self.handle.id(),
                    room = %self.handle.room(),
                    error = %e,
                    "Failed to save message"
                );
                let frame = ServerFrame::error("Failed to save message");
                return self.send(&frame).await.err().map(|_| SessionEnd::WriteFailed);
            }
        };

        tracing::debug!(
            connection_id = %self.handle.id(),
            room = %self.handle.room(),
            message_id = message.id,
            "Message saved"
        );

        match self.ctx.dispatcher.dispatch(message).await {
            Ok(()) => None,
            Err(e) => {
                tracing::error!(connection_id = %self.handle.id(), error = %e, "Dispatch failed");
                Some(SessionEnd::DispatcherStopped)
            }
        }
    }

    async fn send(&mut self, frame: &ServerFrame) -> Result<(), TransportError> {
        let text = serde_json::to_string(frame)
            .map_err(|e| TransportError::Protocol(e.to_string()))?;
        self.transport.write_frame(text).await
    }
}
