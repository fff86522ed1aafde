//! Room Relay
//!
//! Live fan-out of chat messages to the streaming connections of a room.
//!
//! ## Architecture
//!
//! - **RoomRegistry**: Room → live connections, the only shared mutable state
//! - **Dispatcher**: Single task that fans each persisted message out to a
//!   snapshot of its room's members, pruning members that cannot keep up
//! - **Session**: Lifecycle of one connection (register, read loop,
//!   deregister, close) over any [`Transport`]
//! - **Handler**: WebSocket upgrade endpoint that authenticates and starts a session
//! - **Frames**: Client and server frame formats
//!
//! ## Usage
//!
//! Clients connect to `/api/v1/rooms/{room}/ws?token=JWT` and then exchange
//! JSON frames:
//!
//! ```javascript
//! // Browser
//! const ws = new WebSocket(`ws://localhost:8080/api/v1/rooms/general/ws?token=${token}`);
//!
//! ws.onopen = () => {
//!   ws.send(JSON.stringify({type: 'message', body: 'hello'}));
//! };
//!
//! ws.onmessage = (event) => {
//!   const frame = JSON.parse(event.data);
//!   // connected | history | message | notice | error | pong
//!   console.log('Received:', frame);
//! };
//! ```

mod dispatcher;
mod frames;
mod handler;
mod registry;
mod session;
mod transport;

pub use dispatcher::{
    fan_out, DispatchError, DispatchHandle, Dispatcher, FanOut, DEFAULT_INTAKE_CAPACITY,
};
pub use frames::{ClientFrame, ServerFrame};
pub use handler::websocket_handler;
pub use registry::{
    ConnectionHandle, ConnectionId, ConnectionInbox, DeliveryError, RegistryConfig, RegistryError,
    RoomRegistry,
};
pub use session::{
    run_session, SessionContext, SessionEnd, SessionState, DEFAULT_OUTBOUND_BUFFER,
};
pub use transport::{
    Transport, TransportError, WsTransport, CLOSE_TOKEN_EXPIRED, CLOSE_TOKEN_INVALID,
};
