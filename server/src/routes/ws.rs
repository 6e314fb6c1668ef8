//! WebSocket handler — per-connection session loop.
//!
//! DESIGN
//! ======
//! The upgrade request is authenticated once from its `token` query
//! parameter. No token means an anonymous demo guest; an unknown token still
//! upgrades, then closes immediately with 1008 so browser clients can read
//! the reason. An accepted connection gets a `connected` welcome and enters a
//! `select!` loop:
//! - Incoming client text → decode once into `ClientMessage` → dispatch
//! - Messages queued by the room registry → forward to the client
//!
//! Handlers return only what goes back to the sender (`pong`, `error`);
//! everything fanned out to a room travels through the registry, including
//! the sender's own echo, so per-room ordering has a single source.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → authenticate → send `connected`
//! 2. Client sends messages → dispatch → replies to sender, fan-out to room
//! 3. Close or send failure → leave every joined room → task exits

use std::collections::HashMap;

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use protocol::{ClientMessage, ServerMessage};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::{BrokerError, ErrorCode};
use crate::services::identity::display_name_or_fallback;
use crate::services::room::{self, Operation};
use crate::services::session::Session;
use crate::state::AppState;

/// Close code for a rejected token (policy violation).
const CLOSE_POLICY: u16 = 1008;
/// Close code when the identity service itself failed.
const CLOSE_INTERNAL: u16 = 1011;

/// Why an upgraded socket is closed before the session starts.
struct Rejection {
    code: u16,
    reason: &'static str,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let session = match params.get("token").filter(|t| !t.is_empty()) {
        None => Ok(Session::anonymous()),
        Some(token) => authenticate(&state, token).await,
    };

    ws.on_upgrade(move |socket| async move {
        match session {
            Ok(session) => run_ws(socket, state, session).await,
            Err(rejection) => reject(socket, rejection).await,
        }
    })
}

async fn authenticate(state: &AppState, token: &str) -> Result<Session, Rejection> {
    match state.identity.authenticate(token).await {
        Ok(Some(user_id)) => {
            let name = display_name_or_fallback(state.identity.as_ref(), &user_id).await;
            Ok(Session::authenticated(user_id, name))
        }
        Ok(None) => {
            let err = BrokerError::Auth("invalid token".into());
            warn!(code = err.error_code(), "ws: rejecting connection");
            Err(Rejection { code: CLOSE_POLICY, reason: "Invalid token" })
        }
        Err(e) => {
            error!(error = %e, "ws: token validation failed");
            Err(Rejection { code: CLOSE_INTERNAL, reason: "Authentication unavailable" })
        }
    }
}

async fn reject(mut socket: WebSocket, rejection: Rejection) {
    let frame = CloseFrame { code: rejection.code, reason: Utf8Bytes::from_static(rejection.reason) };
    if let Err(e) = socket.send(Message::Close(Some(frame))).await {
        debug!(error = %e, "ws: close frame not delivered");
    }
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, mut session: Session) {
    // Per-connection queue for replays and room broadcasts.
    let (client_tx, mut client_rx) = mpsc::channel::<ServerMessage>(state.config.client_channel_capacity);

    if send_message(&mut socket, &session.connected_message()).await.is_err() {
        return;
    }

    info!(
        connection_id = %session.connection_id,
        user_id = session.user_id.as_deref().unwrap_or("-"),
        demo = session.is_anonymous(),
        "ws: client connected"
    );

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        dispatch_message(&state, &mut socket, &mut session, &client_tx, &text).await;
                    }
                    Message::Binary(bytes) => {
                        warn!(connection_id = %session.connection_id, len = bytes.len(), "ws: dropping binary frame");
                    }
                    Message::Close(_) => break,
                    Message::Ping(_) | Message::Pong(_) => {}
                }
            }
            Some(message) = client_rx.recv() => {
                if send_message(&mut socket, &message).await.is_err() {
                    break;
                }
            }
        }
    }

    room::disconnect(&state, &session).await;
    info!(connection_id = %session.connection_id, rooms = session.joined.len(), "ws: client disconnected");
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Process one inbound text message and send any replies to the sender.
async fn dispatch_message(
    state: &AppState,
    socket: &mut WebSocket,
    session: &mut Session,
    client_tx: &mpsc::Sender<ServerMessage>,
    text: &str,
) {
    let replies = process_inbound_text(state, session, client_tx, text).await;
    for reply in replies {
        if send_message(socket, &reply).await.is_err() {
            // The next recv observes the broken socket and ends the loop.
            return;
        }
    }
}

/// Decode and handle one inbound text message, returning messages for the
/// sender only.
///
/// Transport stays out of this function so tests can drive dispatch with a
/// plain channel in place of a socket.
async fn process_inbound_text(
    state: &AppState,
    session: &mut Session,
    client_tx: &mpsc::Sender<ServerMessage>,
    text: &str,
) -> Vec<ServerMessage> {
    let message = match protocol::decode_client(text) {
        Ok(m) => m,
        Err(e) => {
            let err = BrokerError::from(e);
            warn!(connection_id = %session.connection_id, code = err.error_code(), error = %err, "ws: dropping message");
            return Vec::new();
        }
    };

    if !matches!(message, ClientMessage::Cursor { .. }) {
        info!(
            connection_id = %session.connection_id,
            kind = message.kind(),
            room_id = message.room_id().unwrap_or("-"),
            "ws: recv"
        );
    }

    let room_id = message.room_id().map(str::to_owned);
    let result = match message {
        ClientMessage::Ping { data } => return vec![ServerMessage::Pong { data }],
        ClientMessage::JoinRoom { room_id } => handle_join(state, session, client_tx, room_id).await,
        ClientMessage::LeaveRoom { room_id } => {
            room::leave_room(state, session.connection_id, &room_id).await;
            session.joined.remove(&room_id);
            Ok(())
        }
        ClientMessage::Draw { room_id, shape } => room::publish(state, session, &room_id, Operation::Draw(shape)).await,
        ClientMessage::Erase { room_id, shape } => room::publish(state, session, &room_id, Operation::Erase(shape)).await,
        ClientMessage::ChatMessage { room_id, text } => {
            let text = text.trim();
            if text.is_empty() {
                warn!(connection_id = %session.connection_id, %room_id, "ws: dropping empty chat message");
                return Vec::new();
            }
            room::publish(state, session, &room_id, Operation::Chat(text.to_owned())).await
        }
        ClientMessage::ClearAll { room_id } => room::publish(state, session, &room_id, Operation::Clear).await,
        ClientMessage::Cursor { room_id, x, y } => room::publish(state, session, &room_id, Operation::Cursor { x, y }).await,
    };

    match result {
        Ok(()) => Vec::new(),
        Err(err) if err.is_silent() => {
            warn!(connection_id = %session.connection_id, code = err.error_code(), error = %err, "ws: dropping message");
            Vec::new()
        }
        Err(err) => {
            warn!(connection_id = %session.connection_id, code = err.error_code(), error = %err, "ws: reporting error");
            vec![err.to_message(room_id.as_deref())]
        }
    }
}

async fn handle_join(
    state: &AppState,
    session: &mut Session,
    client_tx: &mpsc::Sender<ServerMessage>,
    room_id: String,
) -> Result<(), BrokerError> {
    if room::join_room(state, session, &room_id, client_tx).await? {
        session.joined.insert(room_id);
    }
    Ok(())
}

// =============================================================================
// SEND
// =============================================================================

async fn send_message(socket: &mut WebSocket, message: &ServerMessage) -> Result<(), ()> {
    let json = match protocol::encode_server(message) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize message");
            return Err(());
        }
    };
    match message {
        ServerMessage::Cursor { .. } => {}
        ServerMessage::Error { code, message, .. } => warn!(%code, %message, "ws: send error"),
        other => debug!(kind = other.kind(), room_id = other.room_id().unwrap_or("-"), "ws: send"),
    }
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
