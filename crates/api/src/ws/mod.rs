//! WebSocket push endpoint.
//!
//! Each connection joins one or more owner rooms on the
//! [`CompletionNotifier`](medassist_events::CompletionNotifier) and receives
//! completion events as JSON text frames.

mod handler;
mod heartbeat;

pub use handler::{ws_handler, WsParams};
pub use heartbeat::HEARTBEAT_INTERVAL;
