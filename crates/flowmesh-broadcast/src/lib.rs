//! Broadcaster and Connection Registry: turns a change-log-driven workflow
//! update into a fan-out to subscribed WebSocket clients (spec §4.4, §4.5).

pub mod broadcaster;
pub mod registry;

pub use broadcaster::{BroadcastError, Broadcaster};
pub use registry::{ConnectionId, ConnectionRegistry, ConnectionSink, SendError};
