//! Inkboard Core Library
//!
//! Wire protocol, client-side canvas model and the sync client for the
//! Inkboard shared whiteboard. Rendering and windowing live elsewhere; they
//! read [`CanvasModel::history`] and talk to the hub through
//! [`NativeClient::dispatch`].

pub mod action;
pub mod canvas;
pub mod collaboration;
pub mod error;
pub mod protocol;
pub mod sync;
pub mod tools;

pub use action::{ActionId, ActionKind, Corners, DrawAction, Rgb};
pub use canvas::CanvasModel;
pub use collaboration::{CollaborationManager, SharedModel};
pub use error::{ClientError, ProtocolError};
pub use protocol::{ControlOp, Message, MessageKind, Payload, SERVER_SENDER_ID};
pub use sync::{ClientCommand, ConnectionState, NativeClient, SyncEvent};
pub use tools::{ToolManager, ToolState};

pub use kurbo::Point;
