//! Collaboration management: the bridge between protocol messages and the
//! local canvas model.
//!
//! This is transport independent. The sync client feeds every inbound frame
//! through [`CollaborationManager::handle_message`] and turns every user
//! command into an outbound frame with [`CollaborationManager::prepare`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::action::DrawAction;
use crate::canvas::CanvasModel;
use crate::error::ProtocolError;
use crate::protocol::{ControlOp, Message, Payload};
use crate::sync::{ClientCommand, SyncEvent};

/// Shared handle to the canvas model; the renderer reads it, the network
/// thread writes it.
pub type SharedModel = Arc<Mutex<CanvasModel>>;

/// Lock the shared model, recovering the data if a holder panicked.
pub fn lock_model(model: &SharedModel) -> MutexGuard<'_, CanvasModel> {
    model.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Applies inbound messages to the model and builds outbound ones.
#[derive(Debug, Clone)]
pub struct CollaborationManager {
    /// Display name, used as the sender id of everything we send.
    display_name: String,
    model: SharedModel,
}

impl CollaborationManager {
    /// Create a manager with an empty model.
    pub fn new(display_name: impl Into<String>) -> Self {
        Self::with_model(display_name, Arc::new(Mutex::new(CanvasModel::new())))
    }

    pub fn with_model(display_name: impl Into<String>, model: SharedModel) -> Self {
        Self {
            display_name: display_name.into(),
            model,
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn model(&self) -> &SharedModel {
        &self.model
    }

    /// Snapshot of the history for rendering.
    pub fn history(&self) -> Vec<DrawAction> {
        lock_model(&self.model).history_copy()
    }

    /// The handshake frame that opens every session.
    pub fn handshake(&self) -> Message {
        Message::sync_request(self.display_name.clone())
    }

    /// Turn a user command into the frame to send.
    ///
    /// Draws are applied to the model right away; the hub's echo later
    /// confirms them. A draw the hub would reject is refused here and never
    /// touches the model. Controls are only applied when the echo arrives, so
    /// every client undoes the element the hub undid. Blank chat lines are
    /// dropped.
    pub fn prepare(&self, command: ClientCommand) -> Result<Option<Message>, ProtocolError> {
        let msg = match command {
            ClientCommand::Draw(action) => {
                action.validate()?;
                lock_model(&self.model).append_local(action.clone());
                Message::draw(self.display_name.clone(), action)
            }
            ClientCommand::Chat(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return Ok(None);
                }
                Message::chat(self.display_name.clone(), text)
            }
            ClientCommand::Control(op) => Message::control(self.display_name.clone(), op),
            ClientCommand::Resync => self.handshake(),
        };
        Ok(Some(msg))
    }

    /// Decode an inbound frame and apply it.
    ///
    /// Malformed frames are logged and skipped.
    pub fn handle_text(&self, json: &str) -> Option<SyncEvent> {
        match Message::decode(json) {
            Ok(msg) => self.handle_message(msg),
            Err(e) => {
                log::warn!("Skipping malformed server message: {}", e);
                None
            }
        }
    }

    /// Apply one inbound message to the model.
    /// Returns a SyncEvent describing what happened.
    pub fn handle_message(&self, msg: Message) -> Option<SyncEvent> {
        let Message { sender_id, payload } = msg;
        match payload {
            Payload::SyncResponse {
                canvas_snapshot,
                text,
            } => {
                let actions = canvas_snapshot.len();
                lock_model(&self.model).set_snapshot(canvas_snapshot);
                Some(SyncEvent::Synced { actions, text })
            }
            Payload::Draw { draw_action } => {
                let id = draw_action.id();
                let confirmed = lock_model(&self.model).confirm(draw_action);
                log::trace!("draw {} from {} (confirmed local: {})", id, sender_id, confirmed);
                Some(SyncEvent::CanvasChanged { from: sender_id })
            }
            Payload::Control { control } => {
                let mut model = lock_model(&self.model);
                match control {
                    ControlOp::Clear => model.clear(),
                    ControlOp::Undo => {
                        model.undo();
                    }
                    ControlOp::Redo => {
                        model.redo();
                    }
                }
                Some(SyncEvent::CanvasChanged { from: sender_id })
            }
            Payload::Chat { text } => Some(SyncEvent::Chat {
                from: sender_id,
                text,
            }),
            Payload::Notification { text } => Some(SyncEvent::Notification { text }),
            Payload::SyncRequest => {
                log::debug!("Ignoring SYNC_REQUEST from {}", sender_id);
                None
            }
        }
    }
}
