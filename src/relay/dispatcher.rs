//! Dispatcher
//!
//! Single sink for persisted messages. Producers hand messages to a bounded
//! intake queue through a [`DispatchHandle`]; one task drains the queue and
//! fans each message out to a snapshot of its room's members.
//!
//! One queue and one consumer keep per-room delivery order equal to the
//! order in which `dispatch` was called. A member that cannot take a frame
//! is treated as dead: it is closed, deregistered, and delivery carries on
//! with the rest of the room.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::frames::ServerFrame;
use super::registry::RoomRegistry;
use crate::store::Message;

/// Default capacity of the intake queue
pub const DEFAULT_INTAKE_CAPACITY: usize = 256;

/// Errors returned to producers
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Dispatcher is not running")]
    Closed,
}

/// Outcome of fanning out one message
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FanOut {
    /// Members that accepted the frame
    pub delivered: usize,
    /// Members removed because they could not accept it
    pub pruned: usize,
}

/// Producer side of the dispatcher
#[derive(Debug, Clone)]
pub struct DispatchHandle {
    intake: mpsc::Sender<Message>,
}

impl DispatchHandle {
    /// Hand a persisted message to the dispatcher
    ///
    /// Waits while the intake queue is full.
    pub async fn dispatch(&self, message: Message) -> Result<(), DispatchError> {
        self.intake
            .send(message)
            .await
            .map_err(|_| DispatchError::Closed)
    }

    /// Whether the dispatcher task has stopped
    pub fn is_closed(&self) -> bool {
        self.intake.is_closed()
    }
}

/// Consumer side: owns the intake queue and a reference to the registry
pub struct Dispatcher {
    registry: Arc<RoomRegistry>,
    intake: mpsc::Receiver<Message>,
}

impl Dispatcher {
    /// Start the dispatcher task
    ///
    /// The task runs until every [`DispatchHandle`] has been dropped.
    pub fn spawn(registry: Arc<RoomRegistry>, capacity: usize) -> (DispatchHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let dispatcher = Self {
            registry,
            intake: rx,
        };

        let task = tokio::spawn(dispatcher.run());
        (DispatchHandle { intake: tx }, task)
    }

    async fn run(mut self) {
        tracing::info!("Dispatcher started");

        while let Some(message) = self.intake.recv().await {
            fan_out(&self.registry, message).await;
        }

        tracing::info!("Dispatcher stopped");
    }
}

/// Deliver one message to the current members of its room
///
/// The member snapshot is taken once, so connections registered after this
/// call starts never see the message and connections already removed never
/// receive it.
pub async fn fan_out(registry: &RoomRegistry, message: Message) -> FanOut {
    let room = message.room.clone();
    let message_id = message.id;

    let members = registry.members_of(&room).await;
    if members.is_empty() {
        tracing::debug!(room = %room, message_id, "No live connections, skipping fan-out");
        return FanOut::default();
    }

    let frame = Arc::new(ServerFrame::Message(message));
    let mut outcome = FanOut::default();

    for member in members {
        match member.try_deliver(Arc::clone(&frame)) {
            Ok(()) => outcome.delivered += 1,
            Err(e) => {
                tracing::warn!(
                    connection_id = %member.id(),
                    room = %room,
                    error = %e,
                    "Delivery failed, removing connection"
                );
                member.close();
                registry.deregister(&room, &member.id()).await;
                outcome.pruned += 1;
            }
        }
    }

    tracing::debug!(
        room = %room,
        message_id,
        delivered = outcome.delivered,
        pruned = outcome.pruned,
        "Message fanned out"
    );
    outcome
}
