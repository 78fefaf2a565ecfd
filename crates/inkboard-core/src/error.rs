//! Error types shared by the protocol and the sync client.

use thiserror::Error;

use crate::action::ActionId;

/// A message could not be encoded, decoded or validated.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Invalid draw action {id}: {reason}")]
    InvalidAction { id: ActionId, reason: String },
}

/// Errors surfaced by the sync client to its caller.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Already connected")]
    AlreadyConnected,
    #[error("Not connected")]
    NotConnected,
    #[error("Send failed: {0}")]
    Send(String),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
