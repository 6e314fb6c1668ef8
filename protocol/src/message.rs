//! Wire messages exchanged over a room-scoped websocket.
//!
//! Both directions are internally tagged JSON objects: `{"type": "draw", ...}`.
//! Every message except `ping`/`pong`, `connected`, and `error` names the room
//! it belongs to.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::shape::Shape;

/// Room identifier as it appears on the wire.
pub type RoomId = String;

/// Reserved prefix that marks a room as an ephemeral demo room.
pub const DEFAULT_DEMO_PREFIX: &str = "demo-";

/// Whether `room_id` names a demo room under the given prefix.
#[must_use]
pub fn is_demo_room(room_id: &str, prefix: &str) -> bool {
    room_id.starts_with(prefix)
}

/// Messages a client sends to the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Liveness probe, answered with `pong` carrying the same data.
    Ping {
        #[serde(default)]
        data: Value,
    },
    JoinRoom {
        room_id: RoomId,
    },
    LeaveRoom {
        room_id: RoomId,
    },
    Draw {
        room_id: RoomId,
        shape: Shape,
    },
    /// Remove every value-equal copy of `shape` from the room.
    Erase {
        room_id: RoomId,
        shape: Shape,
    },
    ChatMessage {
        room_id: RoomId,
        #[serde(alias = "message")]
        text: String,
    },
    ClearAll {
        room_id: RoomId,
    },
    /// Ephemeral pointer position in canvas space.
    Cursor {
        room_id: RoomId,
        x: f64,
        y: f64,
    },
}

impl ClientMessage {
    /// Wire name of the message, for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ping { .. } => "ping",
            Self::JoinRoom { .. } => "join_room",
            Self::LeaveRoom { .. } => "leave_room",
            Self::Draw { .. } => "draw",
            Self::Erase { .. } => "erase",
            Self::ChatMessage { .. } => "chat_message",
            Self::ClearAll { .. } => "clear_all",
            Self::Cursor { .. } => "cursor",
        }
    }

    /// Room the message targets, if any.
    #[must_use]
    pub fn room_id(&self) -> Option<&str> {
        match self {
            Self::Ping { .. } => None,
            Self::JoinRoom { room_id }
            | Self::LeaveRoom { room_id }
            | Self::Draw { room_id, .. }
            | Self::Erase { room_id, .. }
            | Self::ChatMessage { room_id, .. }
            | Self::ClearAll { room_id }
            | Self::Cursor { room_id, .. } => Some(room_id),
        }
    }

    /// Shape carried by the message, if any.
    #[must_use]
    pub fn shape(&self) -> Option<&Shape> {
        match self {
            Self::Draw { shape, .. } | Self::Erase { shape, .. } => Some(shape),
            _ => None,
        }
    }
}

/// One persisted chat line, as replayed to a joining client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEntry {
    pub from: String,
    pub name: String,
    pub text: String,
    /// Milliseconds since the Unix epoch.
    pub ts: i64,
}

/// Messages the broker sends to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// First message on every accepted connection.
    Connected {
        connection_id: Uuid,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        display_name: String,
        demo: bool,
    },
    Pong {
        #[serde(default)]
        data: Value,
    },
    /// Persisted shapes (in stored order) and recent chat, sent to a joiner.
    RoomState {
        room_id: RoomId,
        shapes: Vec<Shape>,
        #[serde(default)]
        chats: Vec<ChatEntry>,
    },
    Draw {
        room_id: RoomId,
        shape: Shape,
        from: String,
        name: String,
        connection_id: Uuid,
    },
    Erase {
        room_id: RoomId,
        shape: Shape,
        from: String,
        connection_id: Uuid,
    },
    ChatMessage {
        room_id: RoomId,
        text: String,
        from: String,
        name: String,
        connection_id: Uuid,
        ts: i64,
    },
    ClearAll {
        room_id: RoomId,
        from: String,
        connection_id: Uuid,
    },
    Cursor {
        room_id: RoomId,
        x: f64,
        y: f64,
        from: String,
        name: String,
        connection_id: Uuid,
    },
    Error {
        code: String,
        message: String,
        #[serde(default)]
        retryable: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_id: Option<RoomId>,
    },
}

impl ServerMessage {
    /// Wire name of the message, for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Pong { .. } => "pong",
            Self::RoomState { .. } => "room_state",
            Self::Draw { .. } => "draw",
            Self::Erase { .. } => "erase",
            Self::ChatMessage { .. } => "chat_message",
            Self::ClearAll { .. } => "clear_all",
            Self::Cursor { .. } => "cursor",
            Self::Error { .. } => "error",
        }
    }

    /// Room the message belongs to, if any.
    #[must_use]
    pub fn room_id(&self) -> Option<&str> {
        match self {
            Self::Connected { .. } | Self::Pong { .. } => None,
            Self::Error { room_id, .. } => room_id.as_deref(),
            Self::RoomState { room_id, .. }
            | Self::Draw { room_id, .. }
            | Self::Erase { room_id, .. }
            | Self::ChatMessage { room_id, .. }
            | Self::ClearAll { room_id, .. }
            | Self::Cursor { room_id, .. } => Some(room_id),
        }
    }

    /// Connection that originated a fanned-out message.
    #[must_use]
    pub fn origin(&self) -> Option<Uuid> {
        match self {
            Self::Draw { connection_id, .. }
            | Self::Erase { connection_id, .. }
            | Self::ChatMessage { connection_id, .. }
            | Self::ClearAll { connection_id, .. }
            | Self::Cursor { connection_id, .. } => Some(*connection_id),
            _ => None,
        }
    }
}
