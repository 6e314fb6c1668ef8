//! Local replica of one joined room.
//!
//! DESIGN
//! ======
//! The replica wraps a [`EngineCore`] and keeps the broker's view and the
//! local view converging:
//! - `room_state` starts a fresh history (`load`), so a joiner's undo stack
//!   never reaches back past the replay
//! - peer `draw` appends; peer `erase` and `clear_all` replace the list
//!   wholesale, so remote truth wins even when the local cursor is mid-stack
//! - echoes of this connection's own `draw`/`erase`/`clear_all` are skipped,
//!   because local edits were applied before they were sent
//! - edits made after `join_room` went out but before its `room_state`
//!   arrived are not in that snapshot; they are kept and replayed on top of
//!   it, since their echoes will be skipped
//!
//! Messages for any room other than the joined one are ignored.

use std::collections::HashMap;
use std::time::Instant;

use canvas::engine::{Action, EngineCore};
use protocol::{ChatEntry, ClientMessage, Point, RoomId, ServerMessage, Shape};
use uuid::Uuid;

use crate::throttle::CursorThrottle;

/// A local edit sent while the room's snapshot was still outstanding.
#[derive(Debug, Clone, PartialEq)]
enum PendingEdit {
    Draw(Shape),
    Erase(Vec<Shape>),
    Clear,
}

/// Last known pointer of another member.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerCursor {
    pub name: String,
    pub at: Point,
}

#[derive(Debug, Default)]
pub struct Replica {
    engine: EngineCore,
    connection_id: Option<Uuid>,
    room_id: Option<RoomId>,
    chats: Vec<ChatEntry>,
    cursors: HashMap<Uuid, PeerCursor>,
    throttle: CursorThrottle,
    /// `Some` between sending `join_room` and applying its `room_state`.
    pending: Option<Vec<PendingEdit>>,
}

impl Replica {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // ROOM
    // =========================================================================

    /// Switch to `room_id`, returning the messages that leave the previous
    /// room and join the new one.
    pub fn join(&mut self, room_id: &str) -> Vec<ClientMessage> {
        let mut out = Vec::new();
        if let Some(previous) = self.room_id.take() {
            if previous == room_id {
                self.room_id = Some(previous);
                return out;
            }
            out.push(ClientMessage::LeaveRoom { room_id: previous });
        }
        self.reset_room();
        self.room_id = Some(room_id.to_owned());
        self.pending = Some(Vec::new());
        out.push(ClientMessage::JoinRoom { room_id: room_id.to_owned() });
        out
    }

    /// Leave the joined room and drop its local state.
    pub fn leave(&mut self) -> Option<ClientMessage> {
        let room_id = self.room_id.take()?;
        self.reset_room();
        Some(ClientMessage::LeaveRoom { room_id })
    }

    /// Join message to resend after a reconnect. The room's snapshot is
    /// outstanding again until the answering `room_state` is applied.
    pub fn rejoin(&mut self) -> Option<ClientMessage> {
        let room_id = self.room_id.clone()?;
        self.pending = Some(Vec::new());
        Some(ClientMessage::JoinRoom { room_id })
    }

    /// Whether a `room_state` for the joined room is still outstanding.
    #[must_use]
    pub fn is_awaiting_state(&self) -> bool {
        self.pending.is_some()
    }

    fn reset_room(&mut self) {
        self.engine.load_room(Vec::new());
        self.chats.clear();
        self.cursors.clear();
        self.throttle.reset();
        self.pending = None;
    }

    // =========================================================================
    // REMOTE
    // =========================================================================

    /// Apply a broker message. Returns `true` when the visible shape list
    /// changed and the canvas should be redrawn.
    pub fn apply(&mut self, message: &ServerMessage) -> bool {
        match message {
            ServerMessage::Connected { connection_id, .. } => {
                self.connection_id = Some(*connection_id);
                // Peers seen on the previous connection may be gone.
                self.cursors.clear();
                false
            }
            ServerMessage::Pong { .. } | ServerMessage::Error { .. } => false,
            other if other.room_id() != self.room_id.as_deref() => false,
            ServerMessage::RoomState { shapes, chats, .. } => {
                self.engine.load_room(shapes.clone());
                self.chats.clone_from(chats);
                for edit in self.pending.take().unwrap_or_default() {
                    self.replay(edit);
                }
                true
            }
            ServerMessage::Draw { shape, connection_id, .. } => {
                if self.is_own(*connection_id) {
                    return false;
                }
                self.engine.apply_remote_draw(shape.clone());
                true
            }
            ServerMessage::Erase { shape, connection_id, .. } => {
                !self.is_own(*connection_id) && self.engine.apply_remote_erase(shape)
            }
            ServerMessage::ClearAll { connection_id, .. } => {
                if self.is_own(*connection_id) {
                    return false;
                }
                self.engine.apply_remote_clear();
                true
            }
            ServerMessage::ChatMessage { text, from, name, ts, .. } => {
                self.chats.push(ChatEntry { from: from.clone(), name: name.clone(), text: text.clone(), ts: *ts });
                false
            }
            ServerMessage::Cursor { x, y, name, connection_id, .. } => {
                self.cursors.insert(*connection_id, PeerCursor { name: name.clone(), at: Point::new(*x, *y) });
                false
            }
        }
    }

    fn is_own(&self, connection_id: Uuid) -> bool {
        self.connection_id == Some(connection_id)
    }

    /// The broker handles a pending edit after the snapshot it just sent, so
    /// it lands on top of the loaded list.
    fn replay(&mut self, edit: PendingEdit) {
        let store = &mut self.engine.store;
        match edit {
            PendingEdit::Draw(shape) => store.append(shape),
            PendingEdit::Erase(shapes) => {
                store.erase_many(&shapes);
            }
            PendingEdit::Clear => store.clear_all(),
        }
    }

    fn record(&mut self, edit: PendingEdit) {
        if let Some(pending) = &mut self.pending {
            pending.push(edit);
        }
    }

    // =========================================================================
    // LOCAL
    // =========================================================================

    /// Translate an engine action into outgoing messages. Shape actions were
    /// already applied to the store by the engine.
    pub fn outgoing(&mut self, action: &Action, now: Instant) -> Vec<ClientMessage> {
        let Some(room_id) = self.room_id.clone() else {
            return Vec::new();
        };
        match action {
            Action::ShapeAdded(shape) => {
                self.record(PendingEdit::Draw(shape.clone()));
                vec![ClientMessage::Draw { room_id, shape: shape.clone() }]
            }
            Action::ShapesErased(shapes) => {
                self.record(PendingEdit::Erase(shapes.clone()));
                shapes
                    .iter()
                    .map(|shape| ClientMessage::Erase { room_id: room_id.clone(), shape: shape.clone() })
                    .collect()
            }
            Action::Cleared => {
                self.record(PendingEdit::Clear);
                vec![ClientMessage::ClearAll { room_id }]
            }
            Action::CursorMoved(at) => {
                if self.throttle.admit(now) {
                    vec![ClientMessage::Cursor { room_id, x: at.x, y: at.y }]
                } else {
                    Vec::new()
                }
            }
            Action::TextRequested { .. } | Action::ExportRequested | Action::SetCursor(_) | Action::RenderNeeded => {
                Vec::new()
            }
        }
    }

    /// Commit a shape locally and return the `draw` to send.
    pub fn draw(&mut self, shape: Shape) -> Option<ClientMessage> {
        let room_id = self.room_id.clone()?;
        self.engine.store.append(shape.clone());
        self.record(PendingEdit::Draw(shape.clone()));
        Some(ClientMessage::Draw { room_id, shape })
    }

    /// Remove value-equal shapes locally and return the `erase` to send.
    pub fn erase(&mut self, shape: Shape) -> Option<ClientMessage> {
        let room_id = self.room_id.clone()?;
        self.engine.store.erase(&shape);
        self.record(PendingEdit::Erase(vec![shape.clone()]));
        Some(ClientMessage::Erase { room_id, shape })
    }

    /// Empty the local list (undoable) and return the `clear_all` to send.
    pub fn clear(&mut self) -> Vec<ClientMessage> {
        let actions = self.engine.clear_all();
        let now = Instant::now();
        actions.iter().flat_map(|action| self.outgoing(action, now)).collect()
    }

    /// Chat text to send. Blank text produces nothing.
    #[must_use]
    pub fn chat(&self, text: &str) -> Option<ClientMessage> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let room_id = self.room_id.clone()?;
        Some(ClientMessage::ChatMessage { room_id, text: text.to_owned() })
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    #[must_use]
    pub fn engine(&self) -> &EngineCore {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut EngineCore {
        &mut self.engine
    }

    #[must_use]
    pub fn shapes(&self) -> &[Shape] {
        self.engine.shapes()
    }

    #[must_use]
    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    #[must_use]
    pub fn connection_id(&self) -> Option<Uuid> {
        self.connection_id
    }

    #[must_use]
    pub fn chats(&self) -> &[ChatEntry] {
        &self.chats
    }

    #[must_use]
    pub fn cursors(&self) -> &HashMap<Uuid, PeerCursor> {
        &self.cursors
    }
}

#[cfg(test)]
#[path = "replica_test.rs"]
mod tests;
