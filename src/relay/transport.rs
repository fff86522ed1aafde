//! Streaming Transport
//!
//! The session lifecycle only needs a frame-oriented, bidirectional channel.
//! [`WsTransport`] adapts an Axum WebSocket to that shape; tests drive
//! sessions through an in-memory implementation instead.

use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message as WsMessage, WebSocket};
use thiserror::Error;

/// Errors surfaced by a transport
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Peer went away or the transport was closed locally
    #[error("Transport closed")]
    Closed,

    /// Peer sent something that is not a text frame
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// A bidirectional text-frame channel for one connection
#[async_trait]
pub trait Transport: Send {
    /// Wait for the next inbound text frame
    ///
    /// Must be cancel-safe: dropping the future must not lose a frame.
    async fn read_frame(&mut self) -> Result<String, TransportError>;

    /// Write one text frame
    async fn write_frame(&mut self, payload: String) -> Result<(), TransportError>;

    /// Close the transport; later reads and writes fail
    async fn close(&mut self);
}

/// Close code sent when the upgrade credential has expired
pub const CLOSE_TOKEN_EXPIRED: u16 = 4001;
/// Close code sent when the upgrade credential is missing or invalid
pub const CLOSE_TOKEN_INVALID: u16 = 4002;

/// Transport over an upgraded Axum WebSocket
pub struct WsTransport {
    socket: WebSocket,
    closed: bool,
}

impl WsTransport {
    pub fn new(socket: WebSocket) -> Self {
        Self {
            socket,
            closed: false,
        }
    }

    /// Send a close frame with an application close code
    pub async fn close_with(&mut self, code: u16, reason: &str) {
        if self.closed {
            return;
        }
        self.closed = true;

        let frame = CloseFrame {
            code,
            reason: reason.to_string().into(),
        };
        let _ = self.socket.send(WsMessage::Close(Some(frame))).await;
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn read_frame(&mut self) -> Result<String, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }

        loop {
            match self.socket.recv().await {
                Some(Ok(WsMessage::Text(text))) => return Ok(text),
                Some(Ok(WsMessage::Binary(bytes))) => {
                    return String::from_utf8(bytes).map_err(|_| {
                        TransportError::Protocol("Binary frames must be UTF-8 JSON".to_string())
                    });
                }
                // Axum answers pings automatically
                Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => continue,
                Some(Ok(WsMessage::Close(_))) | None => return Err(TransportError::Closed),
                Some(Err(e)) => return Err(TransportError::Protocol(e.to_string())),
            }
        }
    }

    async fn write_frame(&mut self, payload: String) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }

        self.socket
            .send(WsMessage::Text(payload))
            .await
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = self.socket.send(WsMessage::Close(None)).await;
    }
}
