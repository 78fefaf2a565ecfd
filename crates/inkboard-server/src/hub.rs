//! The broadcast hub: canonical canvas history plus the session registry.
//!
//! Every operation takes the one hub lock, mutates, and enqueues the
//! resulting messages on each session's outbound queue before releasing it.
//! Enqueueing never blocks, so the order in which sessions observe
//! Draw/Control/Join/Leave events is exactly the order the hub applied them.
//!
//! Queues are bounded. A session whose queue is full (its peer stopped
//! reading) or closed (its writer exited) is treated as dead and reaped.

use std::collections::VecDeque;

use inkboard_core::action::DrawAction;
use inkboard_core::protocol::{ControlOp, Message};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Unique identifier for sessions.
pub type SessionId = Uuid;

/// Outbound queue of one session, drained by that session's writer task.
pub type Outbound = mpsc::Sender<Message>;

/// One registered participant.
struct Session {
    id: SessionId,
    name: String,
    outbound: Outbound,
    /// Cleared when a delivery fails; the session is reaped after the pass.
    alive: bool,
}

#[derive(Default)]
struct HubState {
    history: Vec<DrawAction>,
    sessions: Vec<Session>,
}

impl HubState {
    fn insert(&mut self, name: &str, outbound: Outbound) -> (SessionId, String) {
        let id = Uuid::new_v4();
        let name = display_name(name, id);
        self.sessions.push(Session {
            id,
            name: name.clone(),
            outbound,
            alive: true,
        });
        (id, name)
    }

    fn remove(&mut self, id: SessionId) -> Option<Session> {
        let pos = self.sessions.iter().position(|s| s.id == id)?;
        Some(self.sessions.remove(pos))
    }

    /// Deliver to every live session; returns the ones that failed.
    fn deliver(&mut self, msg: &Message) -> Vec<SessionId> {
        let mut failed = Vec::new();
        for session in self.sessions.iter_mut().filter(|s| s.alive) {
            if !enqueue(session, msg.clone()) {
                failed.push(session.id);
            }
        }
        failed
    }

    /// Broadcast, then reap sessions whose delivery failed.
    ///
    /// Each reaped session gets a Leave notification, which may in turn
    /// uncover more dead sessions; the loop runs until none are left.
    fn broadcast(&mut self, msg: &Message) {
        let mut dead: VecDeque<SessionId> = self.deliver(msg).into();
        while let Some(id) = dead.pop_front() {
            if let Some(session) = self.remove(id) {
                info!(session_id = %id, name = %session.name, "Session reaped");
                dead.extend(self.deliver(&Message::left(&session.name)));
            }
        }
    }

    /// Send to a single session, reaping it if its queue is gone.
    fn send_to(&mut self, id: SessionId, msg: Message) -> bool {
        let Some(session) = self.sessions.iter_mut().find(|s| s.id == id && s.alive) else {
            return false;
        };
        if enqueue(session, msg) {
            return true;
        }
        if let Some(session) = self.remove(id) {
            self.broadcast(&Message::left(&session.name));
        }
        false
    }
}

/// Queue one message without waiting; a failure marks the session dead.
fn enqueue(session: &mut Session, msg: Message) -> bool {
    let reason = match session.outbound.try_send(msg) {
        Ok(()) => return true,
        Err(TrySendError::Full(_)) => "outbound queue full",
        Err(TrySendError::Closed(_)) => "outbound queue closed",
    };
    warn!(session_id = %session.id, name = %session.name, reason, "Delivery failed, dropping session");
    session.alive = false;
    false
}

/// Fallback name for sessions that handshake without one.
fn display_name(requested: &str, id: SessionId) -> String {
    let trimmed = requested.trim();
    if trimmed.is_empty() {
        let simple = id.simple().to_string();
        format!("guest-{}", &simple[..8])
    } else {
        trimmed.to_string()
    }
}

/// The single authority over the canvas history and the session registry.
#[derive(Default)]
pub struct Hub {
    state: Mutex<HubState>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session; subsequent broadcasts include it.
    ///
    /// Returns the session id and the display name actually used.
    pub async fn register(&self, name: &str, outbound: Outbound) -> (SessionId, String) {
        let mut state = self.state.lock().await;
        let (id, name) = state.insert(name, outbound);
        debug!(session_id = %id, name = %name, "Session registered");
        (id, name)
    }

    /// Register a session, queue its snapshot reply and announce it, atomically.
    ///
    /// Because the snapshot is taken and queued under the same lock that
    /// orders all mutations, every draw applied before the handshake is in
    /// the snapshot and every draw applied after it follows the snapshot on
    /// the new session's queue.
    pub async fn handshake(&self, name: &str, outbound: Outbound) -> (SessionId, String) {
        let mut state = self.state.lock().await;
        let (id, name) = state.insert(name, outbound);
        let snapshot = Message::sync_response(state.history.clone());
        state.send_to(id, snapshot);
        state.broadcast(&Message::joined(&name));
        info!(session_id = %id, name = %name, history = state.history.len(), "Session joined");
        (id, name)
    }

    /// Remove a session and announce that it left.
    ///
    /// Returns false if the session was already gone (for example reaped
    /// after a failed delivery, which announced the leave already).
    pub async fn unregister(&self, id: SessionId) -> bool {
        let mut state = self.state.lock().await;
        let Some(session) = state.remove(id) else {
            return false;
        };
        info!(session_id = %id, name = %session.name, "Session left");
        state.broadcast(&Message::left(&session.name));
        true
    }

    /// Append to history, then echo the draw to every session including the origin.
    pub async fn apply_draw(&self, sender_id: &str, action: DrawAction) {
        let mut state = self.state.lock().await;
        state.history.push(action.clone());
        debug!(sender = %sender_id, action_id = %action.id(), len = state.history.len(), "Draw applied");
        state.broadcast(&Message::draw(sender_id, action));
    }

    /// Apply a control op and echo it.
    ///
    /// Undo on an empty history is a no-op but still echoed. Redo is only
    /// relayed: the hub keeps no redo stack.
    pub async fn apply_control(&self, sender_id: &str, op: ControlOp) {
        let mut state = self.state.lock().await;
        match op {
            ControlOp::Clear => state.history.clear(),
            ControlOp::Undo => {
                state.history.pop();
            }
            ControlOp::Redo => {}
        }
        debug!(sender = %sender_id, ?op, len = state.history.len(), "Control applied");
        state.broadcast(&Message::control(sender_id, op));
    }

    /// Relay a chat message verbatim to every session.
    pub async fn broadcast_chat(&self, msg: Message) {
        let mut state = self.state.lock().await;
        state.broadcast(&msg);
    }

    /// Queue a message for one session, ordered with respect to broadcasts.
    pub async fn send_to(&self, id: SessionId, msg: Message) -> bool {
        let mut state = self.state.lock().await;
        state.send_to(id, msg)
    }

    /// Answer a mid-session SYNC_REQUEST with a fresh snapshot; nothing is broadcast.
    pub async fn resync(&self, id: SessionId) -> bool {
        let mut state = self.state.lock().await;
        let snapshot = Message::sync_response(state.history.clone());
        state.send_to(id, snapshot)
    }

    /// Copy of the current history.
    pub async fn snapshot(&self) -> Vec<DrawAction> {
        self.state.lock().await.history.clone()
    }

    pub async fn history_len(&self) -> usize {
        self.state.lock().await.history.len()
    }

    pub async fn session_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }

    /// Display names in registration order.
    pub async fn session_names(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state.sessions.iter().map(|s| s.name.clone()).collect()
    }
}
