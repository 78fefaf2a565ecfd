//! WebSocket session lifecycle: handshake, read loop and the writer task.

use std::fmt;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use inkboard_core::error::ProtocolError;
use inkboard_core::protocol::{Message, MessageKind, Payload};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::hub::{Hub, SessionId};
use crate::server::AppState;

/// How long the writer may keep flushing after the session is unregistered.
const WRITER_DRAIN: Duration = Duration::from_secs(1);

/// Where a connection is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Upgraded, waiting for the SYNC_REQUEST.
    Handshaking,
    /// Registered with the hub.
    Active,
    Closed,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Handshaking => "handshaking",
            Self::Active => "active",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Why a connection never made it past the handshake.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("no SYNC_REQUEST within {0:?}")]
    Timeout(Duration),
    #[error("peer closed the connection")]
    Closed,
    #[error("transport error: {0}")]
    Transport(#[from] axum::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("expected SYNC_REQUEST, got {0}")]
    UnexpectedMessage(MessageKind),
}

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let limit = state.config.max_message_bytes;
    ws.max_message_size(limit)
        .max_frame_size(limit)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drive one connection from upgrade to close.
pub async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut phase = SessionPhase::Handshaking;
    debug!(%phase, "New WebSocket connection");

    let timeout = state.config.handshake_timeout;
    let requested = match tokio::time::timeout(timeout, read_handshake(&mut ws_rx)).await {
        Ok(Ok(name)) => name,
        Ok(Err(e)) => {
            warn!(%phase, error = %e, "Handshake failed");
            let _ = ws_tx.send(WsMessage::Close(None)).await;
            return;
        }
        Err(_) => {
            warn!(%phase, error = %HandshakeError::Timeout(timeout), "Handshake failed");
            let _ = ws_tx.send(WsMessage::Close(None)).await;
            return;
        }
    };

    let (outbound, outbound_rx) = mpsc::channel(state.config.outbound_capacity);
    let mut writer = tokio::spawn(write_loop(ws_tx, outbound_rx));
    let (session_id, name) = state.hub.handshake(&requested, outbound).await;
    phase = SessionPhase::Active;
    debug!(session_id = %session_id, name = %name, %phase, "Handshake complete");

    let mut writer_done = false;
    loop {
        let frame = tokio::select! {
            frame = ws_rx.next() => frame,
            // The writer stops once the socket fails or the hub reaped us.
            _ = &mut writer => {
                writer_done = true;
                debug!(session_id = %session_id, "Writer stopped");
                break;
            }
        };
        let Some(frame) = frame else {
            break;
        };
        match frame {
            Ok(WsMessage::Text(text)) => match Message::decode(text.as_str()) {
                Ok(msg) => dispatch(&state.hub, session_id, msg).await,
                Err(e) => {
                    warn!(session_id = %session_id, name = %name, error = %e, "Skipping malformed frame");
                }
            },
            Ok(WsMessage::Close(_)) => {
                debug!(session_id = %session_id, "Client requested close");
                break;
            }
            Ok(WsMessage::Binary(_)) => {
                debug!(session_id = %session_id, "Ignoring binary frame");
            }
            // Axum answers pings itself
            Ok(_) => {}
            Err(e) => {
                warn!(session_id = %session_id, name = %name, error = %e, "WebSocket error");
                break;
            }
        }
    }

    phase = SessionPhase::Closed;
    state.hub.unregister(session_id).await;
    // The hub dropped our queue; let the writer flush what is left, then stop it.
    if !writer_done && tokio::time::timeout(WRITER_DRAIN, &mut writer).await.is_err() {
        writer.abort();
    }
    info!(session_id = %session_id, name = %name, %phase, "Connection closed");
}

/// Wait for the first text frame and require it to be a SYNC_REQUEST.
///
/// Returns the display name the client asked for.
async fn read_handshake(ws_rx: &mut SplitStream<WebSocket>) -> Result<String, HandshakeError> {
    while let Some(frame) = ws_rx.next().await {
        match frame? {
            WsMessage::Text(text) => {
                let msg = Message::decode(text.as_str())?;
                return match msg.payload {
                    Payload::SyncRequest => Ok(msg.sender_id),
                    _ => Err(HandshakeError::UnexpectedMessage(msg.kind())),
                };
            }
            WsMessage::Close(_) => return Err(HandshakeError::Closed),
            _ => continue,
        }
    }
    Err(HandshakeError::Closed)
}

/// Own the socket sink and drain the session's outbound queue into it.
async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, WsMessage>,
    mut outbound: mpsc::Receiver<Message>,
) {
    while let Some(msg) = outbound.recv().await {
        let json = match msg.encode() {
            Ok(json) => json,
            Err(e) => {
                warn!(kind = %msg.kind(), error = %e, "Failed to encode outbound message");
                continue;
            }
        };
        if ws_tx.send(WsMessage::Text(json.into())).await.is_err() {
            // Dropping the receiver makes the hub reap this session.
            break;
        }
    }
    let _ = ws_tx.close().await;
}

/// Route one decoded client message to the hub.
async fn dispatch(hub: &Hub, session_id: SessionId, msg: Message) {
    let kind = msg.kind();
    debug!(session_id = %session_id, %kind, sender = %msg.sender_id, "Dispatching");
    let Message { sender_id, payload } = msg;
    match payload {
        Payload::Chat { text } => hub.broadcast_chat(Message::chat(sender_id, text)).await,
        Payload::Draw { draw_action } => hub.apply_draw(&sender_id, draw_action).await,
        Payload::Control { control } => hub.apply_control(&sender_id, control).await,
        Payload::SyncRequest => {
            hub.resync(session_id).await;
        }
        Payload::SyncResponse { .. } | Payload::Notification { .. } => {
            warn!(session_id = %session_id, %kind, "Ignoring server-only message from client");
        }
    }
}
