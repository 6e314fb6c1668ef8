//! Room registry — membership, replay, persist-then-fan-out.
//!
//! DESIGN
//! ======
//! Live rooms sit in `AppState::rooms`, created on first join and evicted
//! when the last member leaves. Every room-scoped mutation (join, publish,
//! leave) runs under that room's `members` mutex, so for a given room the
//! sequence "check membership → persist → enqueue to every member" is
//! atomic with respect to other operations on the same room. Different rooms
//! never contend.
//!
//! Fan-out uses `try_send` into each member's bounded queue: a slow or dead
//! peer drops its own copy and never delays the others. Because one
//! connection's messages are processed in order by its own task and each
//! queue is FIFO, every observer sees a sender's operations in send order.
//!
//! LOCK ORDER
//! ==========
//! The room map lock is never held while awaiting a room's `members` lock.
//! Eviction marks the room closed under `members`, releases it, then removes
//! the map entry only if it still points at that same room.
//!
//! ERROR HANDLING
//! ==============
//! Membership failures are returned to the caller, which logs and drops
//! them. A persistence failure does not stop fan-out; it is returned after
//! the broadcast so the initiating connection can be told.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use protocol::{ChatEntry, RoomId, ServerMessage, Shape};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::BrokerError;
use crate::services::persistence::StoreError;
use crate::services::session::Session;
use crate::state::{AppState, Room};

// =============================================================================
// TYPES
// =============================================================================

/// A room-scoped operation submitted by a member.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Draw(Shape),
    Erase(Shape),
    Chat(String),
    Clear,
    Cursor { x: f64, y: f64 },
}

impl Operation {
    fn kind(&self) -> &'static str {
        match self {
            Self::Draw(_) => "draw",
            Self::Erase(_) => "erase",
            Self::Chat(_) => "chat_message",
            Self::Clear => "clear_all",
            Self::Cursor { .. } => "cursor",
        }
    }
}

/// Current time as milliseconds since Unix epoch.
fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

// =============================================================================
// JOIN / LEAVE
// =============================================================================

/// Join `room_id`, replaying its persisted state to `tx` first.
///
/// Returns `Ok(true)` when the connection became a member and `Ok(false)`
/// when it already was one (join is idempotent and does not replay again).
///
/// # Errors
///
/// - [`BrokerError::AuthRequired`] for anonymous sessions on non-demo rooms.
/// - [`BrokerError::NotFound`] when the directory has no such room.
/// - [`BrokerError::Persistence`] when the replay cannot be loaded.
/// - [`BrokerError::Backlogged`] when the connection's queue has no room for
///   the replay.
///
/// The connection is not joined when any of these is returned.
pub async fn join_room(
    state: &AppState,
    session: &Session,
    room_id: &str,
    tx: &mpsc::Sender<ServerMessage>,
) -> Result<bool, BrokerError> {
    let demo = state.config.is_demo_room(room_id);
    if !demo {
        if session.is_anonymous() {
            return Err(BrokerError::AuthRequired(room_id.to_owned()));
        }
        if state.directory.find_room(room_id).await?.is_none() {
            return Err(BrokerError::NotFound(room_id.to_owned()));
        }
    }

    loop {
        let room = get_or_create(state, room_id).await;
        let mut members = room.members.lock().await;
        if room.is_closed() {
            // Lost a race with eviction; the next lookup creates a fresh room.
            continue;
        }
        if members.contains_key(&session.connection_id) {
            return Ok(false);
        }

        let replay = if demo { Ok((Vec::new(), Vec::new())) } else { load_replay(state, room_id).await };
        let delivered = match replay {
            Ok((shapes, chats)) => {
                let shape_count = shapes.len();
                let message = ServerMessage::RoomState { room_id: room_id.to_owned(), shapes, chats };
                match tx.try_send(message) {
                    Ok(()) => Ok(shape_count),
                    Err(e) => {
                        warn!(connection_id = %session.connection_id, %room_id, error = %e, "room: replay not delivered");
                        Err(BrokerError::Backlogged(room_id.to_owned()))
                    }
                }
            }
            Err(e) => {
                error!(connection_id = %session.connection_id, %room_id, error = %e, "room: replay load failed");
                Err(BrokerError::Persistence(e))
            }
        };

        let shape_count = match delivered {
            Ok(n) => n,
            Err(e) => {
                // A room created for this join must not outlive it.
                if members.is_empty() {
                    room.close();
                    drop(members);
                    evict(state, room_id, &room).await;
                }
                return Err(e);
            }
        };

        members.insert(session.connection_id, tx.clone());
        info!(
            connection_id = %session.connection_id,
            %room_id,
            demo,
            shapes = shape_count,
            members = members.len(),
            "room: joined"
        );
        return Ok(true);
    }
}

/// Remove the connection from `room_id`. Returns whether it was a member.
pub async fn leave_room(state: &AppState, connection_id: Uuid, room_id: &str) -> bool {
    let Some(room) = lookup(state, room_id).await else {
        return false;
    };

    let mut members = room.members.lock().await;
    let removed = members.remove(&connection_id).is_some();
    let empty = members.is_empty();
    if empty {
        room.close();
    }
    drop(members);

    if removed {
        info!(%connection_id, %room_id, "room: left");
    }
    if empty {
        evict(state, room_id, &room).await;
    }
    removed
}

/// Remove a disconnecting session from every room it joined.
///
/// Completes before the websocket task exits, so no later broadcast is ever
/// enqueued for this connection.
pub async fn disconnect(state: &AppState, session: &Session) {
    for room_id in &session.joined {
        leave_room(state, session.connection_id, room_id).await;
    }
}

/// Persisted shapes in stored order plus the most recent chat lines.
async fn load_replay(state: &AppState, room_id: &str) -> Result<(Vec<Shape>, Vec<ChatEntry>), StoreError> {
    let page_size = state.config.replay_page_size.max(1);
    let mut shapes = Vec::new();
    loop {
        let offset = i64::try_from(shapes.len()).unwrap_or(i64::MAX);
        let page = state.store.list_drawings(room_id, page_size, offset).await?;
        let short = i64::try_from(page.len()).unwrap_or(i64::MAX) < page_size;
        shapes.extend(page);
        if short {
            break;
        }
    }
    let chats = state.store.list_chats(room_id, state.config.replay_chat_limit, 0).await?;
    Ok((shapes, chats))
}

async fn lookup(state: &AppState, room_id: &str) -> Option<Arc<Room>> {
    state.rooms.read().await.get(room_id).cloned()
}

async fn get_or_create(state: &AppState, room_id: &str) -> Arc<Room> {
    if let Some(room) = lookup(state, room_id).await {
        if !room.is_closed() {
            return room;
        }
    }

    let mut rooms = state.rooms.write().await;
    match rooms.get(room_id) {
        Some(room) if !room.is_closed() => room.clone(),
        _ => {
            let room = Arc::new(Room::new());
            rooms.insert(room_id.to_owned(), room.clone());
            room
        }
    }
}

async fn evict(state: &AppState, room_id: &str, room: &Arc<Room>) {
    let mut rooms = state.rooms.write().await;
    if let Some(current) = rooms.get(room_id) {
        if Arc::ptr_eq(current, room) {
            rooms.remove(room_id);
            info!(%room_id, "room: evicted");
        }
    }
}

// =============================================================================
// PUBLISH
// =============================================================================

/// Persist `op` (unless the room is a demo room or the op is ephemeral) and
/// fan it out to the room's members.
///
/// Cursor updates skip the sender; everything else reaches every member,
/// sender included.
///
/// # Errors
///
/// - [`BrokerError::Membership`] if the session has not joined the room;
///   nothing is persisted or broadcast.
/// - [`BrokerError::Persistence`] if the durable write failed; the
///   broadcast has already gone out.
pub async fn publish(state: &AppState, session: &Session, room_id: &str, op: Operation) -> Result<(), BrokerError> {
    let Some(room) = lookup(state, room_id).await else {
        return Err(BrokerError::Membership(room_id.to_owned()));
    };

    let members = room.members.lock().await;
    if room.is_closed() || !members.contains_key(&session.connection_id) {
        return Err(BrokerError::Membership(room_id.to_owned()));
    }

    let kind = op.kind();
    let durable = !state.config.is_demo_room(room_id);
    let from = session.from();
    let connection_id = session.connection_id;
    let room_id_owned: RoomId = room_id.to_owned();

    let (message, persisted, exclude) = match op {
        Operation::Draw(shape) => {
            let persisted = if durable {
                state.store.append_drawing(room_id, &shape, session.user_id.as_deref()).await
            } else {
                Ok(())
            };
            let message = ServerMessage::Draw {
                room_id: room_id_owned,
                shape,
                from,
                name: session.display_name.clone(),
                connection_id,
            };
            (message, persisted, None)
        }
        Operation::Erase(shape) => {
            let persisted = if durable { state.store.delete_drawing(room_id, &shape).await.map(|_| ()) } else { Ok(()) };
            let message = ServerMessage::Erase { room_id: room_id_owned, shape, from, connection_id };
            (message, persisted, None)
        }
        Operation::Chat(text) => {
            let entry = ChatEntry { from, name: session.display_name.clone(), text, ts: now_ms() };
            let persisted =
                if durable && !session.is_anonymous() { state.store.append_chat(room_id, &entry).await } else { Ok(()) };
            let message = ServerMessage::ChatMessage {
                room_id: room_id_owned,
                text: entry.text,
                from: entry.from,
                name: entry.name,
                connection_id,
                ts: entry.ts,
            };
            (message, persisted, None)
        }
        Operation::Clear => {
            let persisted = if durable { state.store.delete_all_drawings(room_id).await.map(|_| ()) } else { Ok(()) };
            let message = ServerMessage::ClearAll { room_id: room_id_owned, from, connection_id };
            (message, persisted, None)
        }
        Operation::Cursor { x, y } => {
            let message = ServerMessage::Cursor {
                room_id: room_id_owned,
                x,
                y,
                from,
                name: session.display_name.clone(),
                connection_id,
            };
            (message, Ok(()), Some(connection_id))
        }
    };

    if let Err(e) = &persisted {
        error!(%connection_id, %room_id, kind, error = %e, "room: persist failed, broadcasting anyway");
    }

    let delivered = fan_out(&members, &message, exclude);
    if exclude.is_none() {
        info!(%connection_id, %room_id, kind, delivered, "room: broadcast");
    }

    persisted.map_err(BrokerError::from)
}

/// Enqueue `message` for every member except `exclude`. Returns the number
/// of queues that accepted it.
fn fan_out(members: &HashMap<Uuid, mpsc::Sender<ServerMessage>>, message: &ServerMessage, exclude: Option<Uuid>) -> usize {
    let mut delivered = 0;
    for (connection_id, tx) in members {
        if Some(*connection_id) == exclude {
            continue;
        }
        match tx.try_send(message.clone()) {
            Ok(()) => delivered += 1,
            Err(TrySendError::Full(_)) => {
                if !matches!(message, ServerMessage::Cursor { .. }) {
                    warn!(%connection_id, kind = message.kind(), "room: member queue full, dropping message");
                }
            }
            // The member's task is exiting; its disconnect cleanup removes it.
            Err(TrySendError::Closed(_)) => {}
        }
    }
    delivered
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
