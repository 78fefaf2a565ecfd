//! Wire protocol shared by the hub and its clients.
//!
//! Every unit on the wire is one JSON text frame holding a [`Message`]:
//! an envelope with the sender id plus exactly one payload selected by the
//! `type` tag.
//!
//! ```json
//! { "type": "SYNC_REQUEST", "senderId": "alice" }
//! { "type": "SYNC_RESPONSE", "senderId": "server", "canvasSnapshot": [ ... ] }
//! { "type": "DRAW", "senderId": "alice", "drawAction": { "id": "...", "actionType": "LINE", ... } }
//! { "type": "CONTROL", "senderId": "bob", "control": "UNDO" }
//! { "type": "CHAT", "senderId": "bob", "text": "hi" }
//! { "type": "NOTIFICATION", "senderId": "server", "text": "carol joined" }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::action::DrawAction;
use crate::error::ProtocolError;

/// Sender id reserved for messages originated by the hub.
pub const SERVER_SENDER_ID: &str = "server";

/// Canvas control operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlOp {
    Undo,
    Redo,
    Clear,
}

/// The payload of a message; the variant is the wire `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Payload {
    Chat {
        text: String,
    },
    Draw {
        draw_action: DrawAction,
    },
    Control {
        control: ControlOp,
    },
    /// Handshake and resync request; the display name travels as the sender id.
    SyncRequest,
    SyncResponse {
        canvas_snapshot: Vec<DrawAction>,
        /// Optional text shown alongside the snapshot.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    Notification {
        text: String,
    },
}

/// Bare message type, used for logging and dispatch tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Chat,
    Draw,
    Control,
    SyncRequest,
    SyncResponse,
    Notification,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::Chat => "CHAT",
            MessageKind::Draw => "DRAW",
            MessageKind::Control => "CONTROL",
            MessageKind::SyncRequest => "SYNC_REQUEST",
            MessageKind::SyncResponse => "SYNC_RESPONSE",
            MessageKind::Notification => "NOTIFICATION",
        };
        f.write_str(name)
    }
}

/// A protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub sender_id: String,
    #[serde(flatten)]
    pub payload: Payload,
}

impl Message {
    pub fn new(sender_id: impl Into<String>, payload: Payload) -> Self {
        Self {
            sender_id: sender_id.into(),
            payload,
        }
    }

    pub fn chat(sender_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(sender_id, Payload::Chat { text: text.into() })
    }

    pub fn draw(sender_id: impl Into<String>, action: DrawAction) -> Self {
        Self::new(sender_id, Payload::Draw { draw_action: action })
    }

    pub fn control(sender_id: impl Into<String>, op: ControlOp) -> Self {
        Self::new(sender_id, Payload::Control { control: op })
    }

    pub fn sync_request(display_name: impl Into<String>) -> Self {
        Self::new(display_name, Payload::SyncRequest)
    }

    /// Snapshot reply, always sent by the hub.
    pub fn sync_response(snapshot: Vec<DrawAction>) -> Self {
        Self::new(
            SERVER_SENDER_ID,
            Payload::SyncResponse {
                canvas_snapshot: snapshot,
                text: None,
            },
        )
    }

    pub fn notification(text: impl Into<String>) -> Self {
        Self::new(SERVER_SENDER_ID, Payload::Notification { text: text.into() })
    }

    pub fn joined(name: &str) -> Self {
        Self::notification(format!("{name} joined"))
    }

    pub fn left(name: &str) -> Self {
        Self::notification(format!("{name} left"))
    }

    pub fn kind(&self) -> MessageKind {
        match self.payload {
            Payload::Chat { .. } => MessageKind::Chat,
            Payload::Draw { .. } => MessageKind::Draw,
            Payload::Control { .. } => MessageKind::Control,
            Payload::SyncRequest => MessageKind::SyncRequest,
            Payload::SyncResponse { .. } => MessageKind::SyncResponse,
            Payload::Notification { .. } => MessageKind::Notification,
        }
    }

    pub fn is_from_server(&self) -> bool {
        self.sender_id == SERVER_SENDER_ID
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode one frame and validate any draw actions it carries.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let msg: Message = serde_json::from_str(text)?;
        match &msg.payload {
            Payload::Draw { draw_action } => draw_action.validate()?,
            Payload::SyncResponse {
                canvas_snapshot, ..
            } => {
                for action in canvas_snapshot {
                    action.validate()?;
                }
            }
            _ => {}
        }
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Rgb;
    use kurbo::Point;

    #[test]
    fn test_sync_request_wire_shape() {
        let json = Message::sync_request("alice").encode().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "SYNC_REQUEST");
        assert_eq!(value["senderId"], "alice");
        assert!(value.get("text").is_none());
    }

    #[test]
    fn test_control_tag_decodes() {
        let msg = Message::decode(r#"{"type":"CONTROL","senderId":"bob","control":"CLEAR"}"#)
            .unwrap();
        assert_eq!(msg.sender_id, "bob");
        assert_eq!(msg.kind(), MessageKind::Control);
        assert_eq!(msg.payload, Payload::Control { control: ControlOp::Clear });
    }

    #[test]
    fn test_snapshot_preserves_order() {
        let actions: Vec<DrawAction> = (0..5)
            .map(|i| {
                let x = i as f64;
                DrawAction::line(Point::new(x, x), Point::new(x + 1.0, x), Rgb::BLACK, 1.0)
            })
            .collect();
        let json = Message::sync_response(actions.clone()).encode().unwrap();
        let decoded = Message::decode(&json).unwrap();
        assert!(decoded.is_from_server());
        match decoded.payload {
            Payload::SyncResponse {
                canvas_snapshot, ..
            } => assert_eq!(canvas_snapshot, actions),
            other => panic!("Wrong payload: {other:?}"),
        }
    }

    #[test]
    fn test_draw_payload_field_name() {
        let action = DrawAction::rect(Point::new(0.0, 0.0), Point::new(2.0, 3.0), Rgb::BLACK, 1.0);
        let value = serde_json::to_value(Message::draw("alice", action.clone())).unwrap();
        assert_eq!(value["type"], "DRAW");
        assert_eq!(value["drawAction"]["id"], action.id().to_string());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            Message::decode("not json"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(Message::decode(r#"{"type":"DANCE","senderId":"x"}"#).is_err());
        assert!(Message::decode(r#"{"type":"CHAT","text":"no sender"}"#).is_err());
    }

    #[test]
    fn test_decode_rejects_invalid_action() {
        let bad = DrawAction::freehand(Vec::new(), Rgb::BLACK, 1.0);
        let json = Message::draw("alice", bad).encode().unwrap();
        assert!(matches!(
            Message::decode(&json),
            Err(ProtocolError::InvalidAction { .. })
        ));
    }

    #[test]
    fn test_join_and_leave_text() {
        assert_eq!(
            Message::joined("carol").payload,
            Payload::Notification { text: "carol joined".into() }
        );
        assert_eq!(
            Message::left("carol").payload,
            Payload::Notification { text: "carol left".into() }
        );
    }
}
