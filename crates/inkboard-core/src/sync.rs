//! WebSocket client for collaboration.
//!
//! [`NativeClient`] owns one connection to the hub. A background thread
//! opens the socket, sends the `SYNC_REQUEST` handshake and then runs the
//! inbound dispatch loop, applying every server message to the shared
//! [`CanvasModel`](crate::canvas::CanvasModel). Outbound sends are queued to
//! that thread and never wait for an acknowledgement.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::action::DrawAction;
use crate::collaboration::{CollaborationManager, SharedModel};
use crate::error::ClientError;
use crate::protocol::ControlOp;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// User intents handed to the client by the presentation layer.
#[derive(Debug, Clone)]
pub enum ClientCommand {
    /// A finished gesture.
    Draw(DrawAction),
    /// A chat line.
    Chat(String),
    /// A toolbar button: undo, redo or clear.
    Control(ControlOp),
    /// Ask the hub for a fresh snapshot.
    Resync,
}

/// Events from the sync client, drained with [`NativeClient::poll_events`].
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Connected to server
    Connected,
    /// Disconnected from server
    Disconnected,
    /// The model was replaced by a hub snapshot.
    Synced {
        actions: usize,
        text: Option<String>,
    },
    /// A draw or control from `from` changed the model.
    CanvasChanged { from: String },
    /// Chat line from a participant.
    Chat { from: String, text: String },
    /// Hub notification (joins, leaves).
    Notification { text: String },
    /// Error occurred
    Error { message: String },
}

/// Display name used when the user did not enter one.
pub fn guest_name() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("guest-{}", millis % 1000)
}

/// At most `max_chars` characters of `text`, cut on a char boundary.
fn log_preview(text: &str, max_chars: usize) -> &str {
    text.char_indices()
        .nth(max_chars)
        .map_or(text, |(end, _)| &text[..end])
}

mod native_client {
    use super::*;
    use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;
    use tungstenite::{connect, Message};
    use url::Url;

    /// How long a socket read blocks before the thread checks its command queue.
    const READ_POLL_INTERVAL: Duration = Duration::from_millis(50);
    const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Commands sent to the WebSocket thread.
    enum WsCommand {
        Send(String),
        Close,
    }

    /// WebSocket client for native platforms.
    ///
    /// Uses a background thread for non-blocking operation.
    pub struct NativeClient {
        state: ConnectionState,
        events: Vec<SyncEvent>,
        collab: CollaborationManager,
        /// Channel to send commands to the WebSocket thread.
        cmd_tx: Option<Sender<WsCommand>>,
        /// Channel to receive events from the WebSocket thread.
        event_rx: Option<Receiver<SyncEvent>>,
        /// Handle to the WebSocket thread.
        _thread: Option<JoinHandle<()>>,
    }

    impl NativeClient {
        /// Create a new disconnected client. A blank name becomes a guest name.
        pub fn new(display_name: &str) -> Self {
            let name = display_name.trim();
            let name = if name.is_empty() {
                guest_name()
            } else {
                name.to_string()
            };
            Self {
                state: ConnectionState::Disconnected,
                events: Vec::new(),
                collab: CollaborationManager::new(name),
                cmd_tx: None,
                event_rx: None,
                _thread: None,
            }
        }

        /// Create a client and connect it in one step.
        pub fn connect_to(url: &str, display_name: &str) -> Result<Self, ClientError> {
            let mut client = Self::new(display_name);
            client.connect(url)?;
            Ok(client)
        }

        /// Connect to the hub and start the inbound dispatch loop.
        pub fn connect(&mut self, url: &str) -> Result<(), ClientError> {
            if self.cmd_tx.is_some() {
                return Err(ClientError::AlreadyConnected);
            }

            let parsed_url = Url::parse(url).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
            if parsed_url.scheme() != "ws" && parsed_url.scheme() != "wss" {
                return Err(ClientError::InvalidUrl(format!(
                    "unsupported scheme: {}",
                    parsed_url.scheme()
                )));
            }
            let handshake = self.collab.handshake().encode()?;

            self.state = ConnectionState::Connecting;

            let (cmd_tx, cmd_rx) = channel::<WsCommand>();
            let (event_tx, event_rx) = channel::<SyncEvent>();
            let collab = self.collab.clone();
            let url = url.to_string();

            let handle = thread::spawn(move || {
                run_connection(&url, handshake, &collab, &cmd_rx, &event_tx);
            });

            self.cmd_tx = Some(cmd_tx);
            self.event_rx = Some(event_rx);
            self._thread = Some(handle);

            Ok(())
        }

        /// Disconnect from the server.
        pub fn disconnect(&mut self) {
            if let Some(tx) = self.cmd_tx.take() {
                let _ = tx.send(WsCommand::Close);
            }
            self.event_rx = None;
            self._thread = None;
            self.state = ConnectionState::Disconnected;
        }

        /// Apply a user command locally where appropriate and send it.
        ///
        /// Fire-and-forget: the call returns once the frame is queued.
        pub fn dispatch(&self, command: ClientCommand) -> Result<(), ClientError> {
            let tx = self.cmd_tx.as_ref().ok_or(ClientError::NotConnected)?;
            let Some(msg) = self.collab.prepare(command)? else {
                return Ok(());
            };
            let json = msg.encode()?;
            tx.send(WsCommand::Send(json))
                .map_err(|e| ClientError::Send(e.to_string()))
        }

        /// Poll for pending events (non-blocking).
        pub fn poll_events(&mut self) -> Vec<SyncEvent> {
            if let Some(ref rx) = self.event_rx {
                while let Ok(event) = rx.try_recv() {
                    match &event {
                        SyncEvent::Connected => self.state = ConnectionState::Connected,
                        SyncEvent::Disconnected => self.state = ConnectionState::Disconnected,
                        SyncEvent::Error { .. } => self.state = ConnectionState::Error,
                        _ => {}
                    }
                    self.events.push(event);
                }
            }

            std::mem::take(&mut self.events)
        }

        /// Get current connection state.
        pub fn state(&self) -> ConnectionState {
            self.state
        }

        /// Check if connected.
        pub fn is_connected(&self) -> bool {
            self.state == ConnectionState::Connected
        }

        pub fn display_name(&self) -> &str {
            self.collab.display_name()
        }

        /// The mirrored canvas, shared with the network thread.
        pub fn model(&self) -> &SharedModel {
            self.collab.model()
        }

        /// Copy of the mirrored history, for redraws.
        pub fn history(&self) -> Vec<DrawAction> {
            self.collab.history()
        }
    }

    impl Drop for NativeClient {
        fn drop(&mut self) {
            self.disconnect();
        }
    }

    /// Body of the WebSocket thread.
    fn run_connection(
        url: &str,
        handshake: String,
        collab: &CollaborationManager,
        cmd_rx: &Receiver<WsCommand>,
        event_tx: &Sender<SyncEvent>,
    ) {
        log::info!("WebSocket thread: connecting to {}", url);

        let mut socket = match connect(url) {
            Ok((socket, response)) => {
                log::info!("WebSocket connected, status: {}", response.status());
                socket
            }
            Err(e) => {
                log::error!("WebSocket connection failed: {}", e);
                let _ = event_tx.send(SyncEvent::Error {
                    message: format!("connection failed: {}", e),
                });
                return;
            }
        };
        let _ = event_tx.send(SyncEvent::Connected);

        // Short read timeout so the loop can interleave queued sends.
        match socket.get_mut() {
            tungstenite::stream::MaybeTlsStream::Plain(tcp) => {
                let _ = tcp.set_read_timeout(Some(READ_POLL_INTERVAL));
                let _ = tcp.set_write_timeout(Some(WRITE_TIMEOUT));
            }
            #[allow(unreachable_patterns)]
            _ => {
                log::debug!("TLS or other stream - using default timeout handling");
            }
        }

        if let Err(e) = socket.send(Message::Text(handshake)) {
            log::error!("Handshake send failed: {}", e);
            let _ = event_tx.send(SyncEvent::Error {
                message: format!("connection lost: {}", e),
            });
            let _ = event_tx.send(SyncEvent::Disconnected);
            return;
        }

        'session: loop {
            loop {
                match cmd_rx.try_recv() {
                    Ok(WsCommand::Send(msg)) => {
                        log::debug!("WebSocket sending: {}", log_preview(&msg, 100));
                        if let Err(e) = socket.send(Message::Text(msg)) {
                            log::error!("WebSocket send error: {}", e);
                            let _ = event_tx.send(SyncEvent::Error {
                                message: format!("connection lost: {}", e),
                            });
                            break 'session;
                        }
                    }
                    Ok(WsCommand::Close) => {
                        log::info!("WebSocket close requested");
                        let _ = socket.close(None);
                        let _ = socket.flush();
                        break 'session;
                    }
                    Err(TryRecvError::Disconnected) => {
                        log::info!("WebSocket command channel disconnected");
                        let _ = socket.close(None);
                        break 'session;
                    }
                    Err(TryRecvError::Empty) => break,
                }
            }

            match socket.read() {
                Ok(Message::Text(txt)) => {
                    log::debug!("WebSocket received: {}", log_preview(&txt, 100));
                    if let Some(event) = collab.handle_text(&txt) {
                        let _ = event_tx.send(event);
                    }
                }
                Ok(Message::Close(_)) => {
                    log::info!("WebSocket received close frame");
                    break;
                }
                Ok(_) => {} // Ignore binary, ping (answered by tungstenite), pong
                Err(tungstenite::Error::Io(ref e))
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(e) => {
                    log::error!("WebSocket read error: {}", e);
                    let _ = event_tx.send(SyncEvent::Error {
                        message: format!("connection lost: {}", e),
                    });
                    break;
                }
            }
        }

        log::info!("WebSocket thread exiting");
        let _ = event_tx.send(SyncEvent::Disconnected);
    }
}

pub use native_client::NativeClient;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guest_name_shape() {
        let name = guest_name();
        assert!(name.starts_with("guest-"));
        assert!(name["guest-".len()..].parse::<u32>().unwrap() < 1000);
    }

    #[test]
    fn test_log_preview_cuts_on_char_boundary() {
        let text = format!("a{}", "é".repeat(80));
        let preview = log_preview(&text, 50);
        assert_eq!(preview.chars().count(), 50);
        assert!(text.starts_with(preview));
        assert_eq!(log_preview("short", 100), "short");
        assert_eq!(log_preview("日本語", 2), "日本");
    }

    #[test]
    fn test_multibyte_chat_with_debug_logging() {
        use crate::protocol::{Message, Payload};
        use std::net::TcpListener;

        // Format arguments of enabled log macros are evaluated even without a logger.
        log::set_max_level(log::LevelFilter::Debug);

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut ws = tungstenite::accept(stream).unwrap();
            loop {
                if let tungstenite::Message::Text(text) = ws.read().unwrap() {
                    let msg = Message::decode(&text).unwrap();
                    if let Payload::Chat { text: chat } = msg.payload {
                        ws.send(tungstenite::Message::Text(text)).unwrap();
                        return chat;
                    }
                }
            }
        });

        let text = format!("a{}", "é".repeat(80));
        let mut client = NativeClient::connect_to(&format!("ws://{addr}/ws"), "alice").unwrap();
        client.dispatch(ClientCommand::Chat(text.clone())).unwrap();

        let mut echoed = false;
        for _ in 0..200 {
            echoed |= client.poll_events().iter().any(|event| {
                matches!(event, SyncEvent::Chat { text: t, .. } if *t == text)
            });
            if echoed {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        assert!(echoed);
        assert_eq!(server.join().unwrap(), text);
    }

    #[test]
    fn test_blank_name_becomes_guest() {
        let client = NativeClient::new("  ");
        assert!(client.display_name().starts_with("guest-"));
        let client = NativeClient::new(" alice ");
        assert_eq!(client.display_name(), "alice");
    }

    #[test]
    fn test_rejects_non_websocket_url() {
        let mut client = NativeClient::new("alice");
        assert!(matches!(
            client.connect("http://localhost:6000/ws"),
            Err(ClientError::InvalidUrl(_))
        ));
        assert!(matches!(client.connect("not a url"), Err(ClientError::InvalidUrl(_))));
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_dispatch_requires_connection() {
        let client = NativeClient::new("alice");
        assert!(matches!(
            client.dispatch(ClientCommand::Chat("hi".into())),
            Err(ClientError::NotConnected)
        ));
        assert!(client.history().is_empty());
    }

    #[test]
    fn test_dispatch_refuses_invalid_draw() {
        use crate::action::Rgb;

        let mut client = NativeClient::new("alice");
        client.connect("ws://127.0.0.1:9/ws").unwrap();
        let empty = DrawAction::freehand(Vec::new(), Rgb::BLACK, 2.0);
        assert!(matches!(
            client.dispatch(ClientCommand::Draw(empty)),
            Err(ClientError::Protocol(_))
        ));
        assert!(client.history().is_empty());
    }

    #[test]
    fn test_unreachable_server_reports_error() {
        let mut client = NativeClient::new("alice");
        // Port 9 (discard) on loopback is almost never listening.
        client.connect("ws://127.0.0.1:9/ws").unwrap();

        let mut events = Vec::new();
        for _ in 0..100 {
            events.extend(client.poll_events());
            if !events.is_empty() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        assert!(matches!(events.first(), Some(SyncEvent::Error { .. })));
        assert_eq!(client.state(), ConnectionState::Error);
    }
}
