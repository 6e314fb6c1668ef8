//! Connection task for one client session.
//!
//! DESIGN
//! ======
//! [`spawn`] starts a task that owns the websocket and the [`Replica`]. The
//! caller talks to it through two channels:
//! - [`Command`]s in: local edits, chat, room changes, close
//! - [`SessionEvent`]s out: every broker message after it was applied, plus
//!   reconnect notices
//!
//! LIFECYCLE
//! =========
//! 1. Connect with the token query parameter, resend `join_room` for the
//!    current room (the broker answers with `room_state`)
//! 2. `select!` over socket reads, commands, and a 25 s ping tick
//! 3. On a lost connection back off and go to 1; a successful connect resets
//!    the attempt count
//!
//! ERROR HANDLING
//! ==============
//! A policy-violation close (bad token) and a malformed URL end the task
//! immediately. Other failures are retried until the backoff is exhausted,
//! which ends the task with [`SessionError::RetriesExhausted`]. Undecodable
//! broker messages are logged and skipped. Commands that arrive while
//! disconnected are dropped: edits made offline are never merged later.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use canvas::engine::Action;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use protocol::{ClientMessage, Point, RoomId, ServerMessage, Shape};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::SessionError;
use crate::reconnect::{Backoff, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY};
use crate::replica::Replica;

/// Keep-alive period while connected.
pub const PING_INTERVAL: Duration = Duration::from_secs(25);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const CHANNEL_CAPACITY: usize = 256;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Broker base URL, `http(s)://` or `ws(s)://`.
    pub url: String,
    /// Session token. `None` connects as a demo guest.
    pub token: Option<String>,
    /// Room to join on every connect.
    pub room_id: Option<RoomId>,
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub ping_interval: Duration,
}

impl SessionConfig {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: None,
            room_id: None,
            max_retries: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            ping_interval: PING_INTERVAL,
        }
    }
}

/// Local intents forwarded to the connection task.
#[derive(Debug, Clone)]
pub enum Command {
    /// An action returned by the canvas engine.
    Action(Action),
    Draw(Shape),
    Erase(Shape),
    Chat(String),
    Clear,
    Cursor(Point),
    Join(RoomId),
    Leave,
    Close,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A broker message, after it was applied to the replica.
    Message {
        message: ServerMessage,
        /// Whether the visible shape list changed.
        changed: bool,
        shape_count: usize,
    },
    /// The connection dropped; the next attempt starts after `delay`.
    Reconnecting { attempt: u32, delay: Duration },
}

/// Caller side of a running session.
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    events: mpsc::Receiver<SessionEvent>,
    task: JoinHandle<Result<Replica, SessionError>>,
}

impl SessionHandle {
    /// Queue a command for the connection task.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] once the task has ended.
    pub async fn send(&self, command: Command) -> Result<(), SessionError> {
        self.commands.send(command).await.map_err(|_| SessionError::Closed)
    }

    /// Next event, or `None` once the task has ended.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Ask the task to close and wait for the final replica.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the task, if any.
    pub async fn close(self) -> Result<Replica, SessionError> {
        // A send failure means the task already ended; join reports why.
        if self.commands.send(Command::Close).await.is_err() {
            debug!("session: task already stopped");
        }
        drop(self.events);
        self.task.await.map_err(|_| SessionError::Closed)?
    }
}

// =============================================================================
// URL
// =============================================================================

/// Websocket endpoint for a broker base URL.
///
/// # Errors
///
/// Returns [`SessionError::InvalidUrl`] for schemes other than
/// `http`, `https`, `ws`, and `wss`.
pub fn ws_url(base_url: &str, token: Option<&str>) -> Result<String, SessionError> {
    let base = base_url.trim_end_matches('/');
    let (scheme, rest) = if let Some(rest) = base.strip_prefix("http://") {
        ("ws", rest)
    } else if let Some(rest) = base.strip_prefix("https://") {
        ("wss", rest)
    } else if let Some(rest) = base.strip_prefix("ws://") {
        ("ws", rest)
    } else if let Some(rest) = base.strip_prefix("wss://") {
        ("wss", rest)
    } else {
        return Err(SessionError::InvalidUrl(base_url.to_owned()));
    };
    if rest.is_empty() {
        return Err(SessionError::InvalidUrl(base_url.to_owned()));
    }
    let rest = rest.strip_suffix("/ws").unwrap_or(rest);
    Ok(match token.filter(|t| !t.is_empty()) {
        Some(token) => format!("{scheme}://{rest}/ws?token={token}"),
        None => format!("{scheme}://{rest}/ws"),
    })
}

// =============================================================================
// TASK
// =============================================================================

/// Start a session task.
#[must_use]
pub fn spawn(config: SessionConfig) -> SessionHandle {
    let (command_tx, command_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let task = tokio::spawn(run(config, command_rx, event_tx));
    SessionHandle { commands: command_tx, events: event_rx, task }
}

/// How a connection ended without an error.
enum Ended {
    /// The caller asked to close.
    Requested,
    /// The socket dropped after a successful connect.
    Lost,
}

async fn run(
    config: SessionConfig,
    mut commands: mpsc::Receiver<Command>,
    events: mpsc::Sender<SessionEvent>,
) -> Result<Replica, SessionError> {
    let mut replica = Replica::new();
    if let Some(room_id) = &config.room_id {
        replica.join(room_id);
    }
    let mut backoff = Backoff::new(config.base_delay, config.max_delay, config.max_retries);

    loop {
        match connect_and_run(&config, &mut replica, &mut commands, &events).await {
            Ok(Ended::Requested) => return Ok(replica),
            Ok(Ended::Lost) => {
                info!("session: connection lost");
                backoff.reset();
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => warn!(error = %e, "session: connection failed"),
        }

        let Some(delay) = backoff.next_delay() else {
            return Err(SessionError::RetriesExhausted { attempts: backoff.attempts() });
        };
        let attempt = backoff.attempts();
        info!(attempt, delay_ms = delay.as_millis(), "session: reconnecting");
        if events.send(SessionEvent::Reconnecting { attempt, delay }).await.is_err() {
            debug!("session: event receiver dropped");
        }

        if wait_offline(delay, &mut commands, &mut replica).await {
            return Ok(replica);
        }
    }
}

/// Sleep out a backoff delay. Returns `true` when the caller asked to close.
async fn wait_offline(delay: Duration, commands: &mut mpsc::Receiver<Command>, replica: &mut Replica) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            () = &mut sleep => return false,
            command = commands.recv() => match command {
                None | Some(Command::Close) => return true,
                // Room changes still apply so the next connect joins the right room.
                Some(Command::Join(room_id)) => {
                    replica.join(&room_id);
                }
                Some(Command::Leave) => {
                    replica.leave();
                }
                Some(other) => warn!(?other, "session: dropping command while disconnected"),
            },
        }
    }
}

async fn connect_and_run(
    config: &SessionConfig,
    replica: &mut Replica,
    commands: &mut mpsc::Receiver<Command>,
    events: &mpsc::Sender<SessionEvent>,
) -> Result<Ended, SessionError> {
    let url = ws_url(&config.url, config.token.as_deref())?;
    let (stream, _) = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(url.as_str()))
        .await
        .map_err(|_| SessionError::Timeout)??;
    let (mut write, mut read) = stream.split();
    info!(url = %config.url, room_id = replica.room_id().unwrap_or("-"), "session: connected");

    if let Some(join) = replica.rejoin() {
        send(&mut write, &join).await?;
    }

    let period = config.ping_interval.max(Duration::from_millis(1));
    let mut ping = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

    loop {
        tokio::select! {
            frame = read.next() => {
                let Some(frame) = frame else { return Ok(Ended::Lost) };
                match frame? {
                    Message::Text(text) => handle_text(replica, events, text.as_str()).await,
                    Message::Close(frame) => {
                        if let Some(frame) = frame {
                            if frame.code == CloseCode::Policy {
                                return Err(SessionError::Rejected { reason: frame.reason.as_str().to_owned() });
                            }
                            info!(code = u16::from(frame.code), reason = frame.reason.as_str(), "session: closed by server");
                        }
                        return Ok(Ended::Lost);
                    }
                    _ => {}
                }
            }
            command = commands.recv() => {
                let Some(command) = command.filter(|c| !matches!(c, Command::Close)) else {
                    if let Err(e) = write.close().await {
                        debug!(error = %e, "session: close not delivered");
                    }
                    return Ok(Ended::Requested);
                };
                for message in outgoing(replica, command) {
                    send(&mut write, &message).await?;
                }
            }
            _ = ping.tick() => {
                send(&mut write, &ClientMessage::Ping { data: serde_json::json!(now_ms()) }).await?;
            }
        }
    }
}

async fn handle_text(replica: &mut Replica, events: &mpsc::Sender<SessionEvent>, text: &str) {
    let message = match protocol::decode_server(text) {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, "session: dropping undecodable message");
            return;
        }
    };
    match &message {
        ServerMessage::Cursor { .. } | ServerMessage::Pong { .. } => {}
        ServerMessage::Error { code, message, .. } => warn!(%code, %message, "session: server error"),
        other => debug!(kind = other.kind(), room_id = other.room_id().unwrap_or("-"), "session: recv"),
    }
    let changed = replica.apply(&message);
    let event = SessionEvent::Message { message, changed, shape_count: replica.shapes().len() };
    if events.send(event).await.is_err() {
        debug!("session: event receiver dropped");
    }
}

/// Apply a command to the replica and collect what goes on the wire.
fn outgoing(replica: &mut Replica, command: Command) -> Vec<ClientMessage> {
    match command {
        Command::Action(action) => replica.outgoing(&action, Instant::now()),
        Command::Draw(shape) => replica.draw(shape).into_iter().collect(),
        Command::Erase(shape) => replica.erase(shape).into_iter().collect(),
        Command::Chat(text) => replica.chat(&text).into_iter().collect(),
        Command::Clear => replica.clear(),
        Command::Cursor(at) => replica.outgoing(&Action::CursorMoved(at), Instant::now()),
        Command::Join(room_id) => replica.join(&room_id),
        Command::Leave => replica.leave().into_iter().collect(),
        Command::Close => Vec::new(),
    }
}

async fn send(write: &mut SplitSink<WsStream, Message>, message: &ClientMessage) -> Result<(), SessionError> {
    let json = protocol::encode_client(message)?;
    if !matches!(message, ClientMessage::Cursor { .. } | ClientMessage::Ping { .. }) {
        debug!(kind = message.kind(), room_id = message.room_id().unwrap_or("-"), "session: send");
    }
    write.send(Message::Text(json.into())).await?;
    Ok(())
}

// =============================================================================
// ONE-SHOT PROBE
// =============================================================================

/// Connect, exchange one `ping`/`pong`, and return the round-trip time.
///
/// # Errors
///
/// Fails when the connection cannot be made, is rejected, or no matching
/// `pong` arrives within `timeout`.
pub async fn ping_once(url: &str, token: Option<&str>, timeout: Duration) -> Result<Duration, SessionError> {
    let url = ws_url(url, token)?;
    tokio::time::timeout(timeout, exchange_ping(&url)).await.map_err(|_| SessionError::Timeout)?
}

async fn exchange_ping(url: &str) -> Result<Duration, SessionError> {
    let (stream, _) = connect_async(url).await?;
    let (mut write, mut read) = stream.split();
    let nonce = Uuid::new_v4().to_string();
    let started = Instant::now();
    send(&mut write, &ClientMessage::Ping { data: serde_json::json!(nonce) }).await?;
    loop {
        if let ServerMessage::Pong { data } = next_message(&mut read).await? {
            if data.as_str() == Some(nonce.as_str()) {
                break;
            }
        }
    }
    let elapsed = started.elapsed();
    if let Err(e) = write.close().await {
        debug!(error = %e, "session: close not delivered");
    }
    Ok(elapsed)
}

async fn next_message(read: &mut SplitStream<WsStream>) -> Result<ServerMessage, SessionError> {
    loop {
        let Some(frame) = read.next().await else {
            return Err(SessionError::Closed);
        };
        match frame? {
            Message::Text(text) => return Ok(protocol::decode_server(text.as_str())?),
            Message::Close(Some(frame)) if frame.code == CloseCode::Policy => {
                return Err(SessionError::Rejected { reason: frame.reason.as_str().to_owned() });
            }
            Message::Close(_) => return Err(SessionError::Closed),
            _ => {}
        }
    }
}

fn now_ms() -> i64 {
    let Ok(duration) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(duration.as_millis()).unwrap_or(0)
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
