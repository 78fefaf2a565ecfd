//! Inkboard hub server
//!
//! Keeps the canonical canvas history and fans every accepted Draw, Control,
//! Chat and presence event out to all connected sessions in one global order.
//!
//! ## Protocol
//!
//! Messages are JSON text frames, one per WebSocket message:
//! ```json
//! { "senderId": "alice", "type": "SYNC_REQUEST" }
//! { "senderId": "server", "type": "SYNC_RESPONSE", "canvasSnapshot": [] }
//! { "senderId": "alice", "type": "DRAW", "drawAction": { "actionType": "LINE", ... } }
//! { "senderId": "alice", "type": "CONTROL", "control": "UNDO" }
//! { "senderId": "alice", "type": "CHAT", "text": "hi" }
//! { "senderId": "server", "type": "NOTIFICATION", "text": "alice joined" }
//! ```

pub mod config;
pub mod connection;
pub mod hub;
pub mod server;

pub use config::{ConfigError, ServerConfig};
pub use hub::{Hub, SessionId};
pub use server::{AppState, router, serve};
