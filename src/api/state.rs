//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::auth::JwtAuthority;
use crate::config::{ApiConfig, RelayConfig};
use crate::relay::{DispatchHandle, Dispatcher, RegistryConfig, RoomRegistry, SessionContext};
use crate::store::SqliteStore;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Rooms, users and message history
    pub store: Arc<SqliteStore>,
    /// Token issuing and verification
    pub auth: Arc<JwtAuthority>,
    /// Live connections grouped by room
    pub registry: Arc<RoomRegistry>,
    /// Intake of the fan-out task
    pub dispatcher: DispatchHandle,
    /// API configuration
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
    outbound_buffer: usize,
    idle_timeout: Option<Duration>,
}

impl AppState {
    /// Create the state and spawn the dispatcher task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        store: Arc<SqliteStore>,
        auth: Arc<JwtAuthority>,
        config: ApiConfig,
        relay: &RelayConfig,
    ) -> Self {
        let registry = Arc::new(RoomRegistry::new(RegistryConfig {
            max_connections: relay.max_connections,
        }));
        let (dispatcher, _task) = Dispatcher::spawn(Arc::clone(&registry), relay.intake_capacity);

        Self {
            store,
            auth,
            registry,
            dispatcher,
            config: Arc::new(config),
            start_time: Instant::now(),
            outbound_buffer: relay.outbound_buffer,
            idle_timeout: relay.idle_timeout(),
        }
    }

    /// Collaborators for a new streaming session
    pub fn session_context(&self) -> SessionContext {
        SessionContext {
            registry: Arc::clone(&self.registry),
            dispatcher: self.dispatcher.clone(),
            store: self.store.clone(),
            outbound_buffer: self.outbound_buffer,
            idle_timeout: self.idle_timeout,
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
