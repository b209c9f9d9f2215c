//! WebSocket gateway: connection registry, event dispatcher, and the
//! per-socket handler.

pub mod connection;
pub mod dispatcher;
pub mod handler;

pub use connection::{ConnectionRegistry, OutboundFrame};
pub use dispatcher::{ConnectionContext, EventDispatcher};
pub use handler::ws_handler;
