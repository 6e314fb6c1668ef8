use super::*;
use crate::services::persistence::{DrawingStore, StoreError};
use crate::state::test_helpers::{self, TestEnv};
use futures_util::{SinkExt, StreamExt};
use protocol::{ChatEntry, Point, Shape};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::time::{Duration, timeout};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

// =============================================================================
// Helpers
// =============================================================================

fn rect_json(x: f64) -> serde_json::Value {
    json!({"type": "rect", "x": x, "y": 0, "width": 10, "height": 10})
}

fn rect(x: f64) -> Shape {
    Shape::Rect { x, y: 0.0, width: 10.0, height: 10.0, color: protocol::DEFAULT_COLOR.into(), stroke_width: 2.0 }
}

async fn inbound(
    state: &AppState,
    session: &mut Session,
    tx: &mpsc::Sender<ServerMessage>,
    value: serde_json::Value,
) -> Vec<ServerMessage> {
    process_inbound_text(state, session, tx, &value.to_string()).await
}

async fn recv(rx: &mut mpsc::Receiver<ServerMessage>) -> ServerMessage {
    timeout(Duration::from_millis(500), rx.recv())
        .await
        .expect("receive timed out")
        .expect("channel closed unexpectedly")
}

async fn assert_nothing(rx: &mut mpsc::Receiver<ServerMessage>) {
    assert!(timeout(Duration::from_millis(50), rx.recv()).await.is_err(), "expected no message");
}

fn error_code(messages: &[ServerMessage]) -> Option<&str> {
    match messages {
        [ServerMessage::Error { code, .. }] => Some(code),
        _ => None,
    }
}

/// Store whose writes always fail.
struct FailingStore;

#[async_trait::async_trait]
impl DrawingStore for FailingStore {
    async fn append_drawing(&self, _: &str, _: &Shape, _: Option<&str>) -> Result<(), StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }
    async fn append_chat(&self, _: &str, _: &ChatEntry) -> Result<(), StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }
    async fn list_drawings(&self, _: &str, _: i64, _: i64) -> Result<Vec<Shape>, StoreError> {
        Ok(Vec::new())
    }
    async fn delete_all_drawings(&self, _: &str) -> Result<u64, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }
    async fn delete_drawing(&self, _: &str, _: &Shape) -> Result<u64, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }
    async fn list_chats(&self, _: &str, _: i64, _: i64) -> Result<Vec<ChatEntry>, StoreError> {
        Ok(Vec::new())
    }
}

// =============================================================================
// DISPATCH
// =============================================================================

#[tokio::test]
async fn ping_replies_pong_with_same_data() {
    let env = test_helpers::test_env();
    let mut session = Session::anonymous();
    let (tx, _rx) = mpsc::channel(8);
    let replies = inbound(&env.state, &mut session, &tx, json!({"type": "ping", "data": {"n": 1}})).await;
    assert_eq!(replies, vec![ServerMessage::Pong { data: json!({"n": 1}) }]);
}

#[tokio::test]
async fn malformed_messages_are_dropped_without_reply() {
    let env = test_helpers::test_env();
    let mut session = Session::anonymous();
    let (tx, mut rx) = mpsc::channel(8);

    assert!(process_inbound_text(&env.state, &mut session, &tx, "{not json").await.is_empty());
    assert!(inbound(&env.state, &mut session, &tx, json!({"type": "teleport"})).await.is_empty());
    assert!(inbound(&env.state, &mut session, &tx, json!({"type": "draw", "roomId": "demo-a"})).await.is_empty());
    let bad_shape = json!({"type": "draw", "roomId": "demo-a", "shape": {"type": "pencil", "path": []}});
    assert!(inbound(&env.state, &mut session, &tx, bad_shape).await.is_empty());
    assert_nothing(&mut rx).await;
}

#[tokio::test]
async fn draw_before_join_is_dropped_and_not_persisted() {
    let env = test_helpers::test_env();
    let room_id = test_helpers::seed_room(&env, "gated").await;
    let mut session = Session::authenticated("u1".into(), "Ada".into());
    let (tx, mut rx) = mpsc::channel(8);

    let draw = json!({"type": "draw", "roomId": room_id, "shape": rect_json(1.0)});
    assert!(inbound(&env.state, &mut session, &tx, draw).await.is_empty());
    assert_nothing(&mut rx).await;
    assert!(env.store.list_drawings(&room_id, 10, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn anonymous_join_of_durable_room_reports_auth_required() {
    let env = test_helpers::test_env();
    let room_id = test_helpers::seed_room(&env, "private").await;
    let mut session = Session::anonymous();
    let (tx, mut rx) = mpsc::channel(8);

    let replies = inbound(&env.state, &mut session, &tx, json!({"type": "join_room", "roomId": room_id})).await;
    assert_eq!(error_code(&replies), Some("E_AUTH_REQUIRED"));
    assert!(session.joined.is_empty());
    assert_nothing(&mut rx).await;
}

#[tokio::test]
async fn join_of_unknown_room_reports_not_found() {
    let env = test_helpers::test_env();
    let mut session = Session::authenticated("u1".into(), "Ada".into());
    let (tx, _rx) = mpsc::channel(8);

    let replies = inbound(&env.state, &mut session, &tx, json!({"type": "join_room", "roomId": "ghost"})).await;
    let [ServerMessage::Error { code, room_id, .. }] = replies.as_slice() else {
        panic!("expected one error, got {replies:?}");
    };
    assert_eq!(code, "E_ROOM_NOT_FOUND");
    assert_eq!(room_id.as_deref(), Some("ghost"));
}

#[tokio::test]
async fn join_then_draw_flows_through_the_room_queue() {
    let env = test_helpers::test_env();
    let room_id = test_helpers::seed_room(&env, "flow").await;
    let mut session = Session::authenticated("u1".into(), "Ada".into());
    let (tx, mut rx) = mpsc::channel(8);

    assert!(inbound(&env.state, &mut session, &tx, json!({"type": "join_room", "roomId": room_id})).await.is_empty());
    assert!(session.joined.contains(&room_id));
    assert!(matches!(recv(&mut rx).await, ServerMessage::RoomState { .. }));

    let draw = json!({"type": "draw", "roomId": room_id, "shape": rect_json(4.0)});
    assert!(inbound(&env.state, &mut session, &tx, draw).await.is_empty());
    let ServerMessage::Draw { shape, connection_id, .. } = recv(&mut rx).await else {
        panic!("expected draw echo");
    };
    assert_eq!(shape, rect(4.0));
    assert_eq!(connection_id, session.connection_id);
    assert_eq!(env.store.list_drawings(&room_id, 10, 0).await.unwrap(), vec![rect(4.0)]);
}

#[tokio::test]
async fn leave_updates_session_membership() {
    let env = test_helpers::test_env();
    let mut session = Session::anonymous();
    let (tx, mut rx) = mpsc::channel(8);

    inbound(&env.state, &mut session, &tx, json!({"type": "join_room", "roomId": "demo-l"})).await;
    recv(&mut rx).await;
    assert!(inbound(&env.state, &mut session, &tx, json!({"type": "leave_room", "roomId": "demo-l"})).await.is_empty());
    assert!(session.joined.is_empty());
    // Leaving again is not an error.
    assert!(inbound(&env.state, &mut session, &tx, json!({"type": "leave_room", "roomId": "demo-l"})).await.is_empty());
}

#[tokio::test]
async fn blank_chat_is_dropped_and_text_is_trimmed() {
    let env = test_helpers::test_env();
    let mut session = Session::anonymous();
    let (tx, mut rx) = mpsc::channel(8);
    inbound(&env.state, &mut session, &tx, json!({"type": "join_room", "roomId": "demo-chat"})).await;
    recv(&mut rx).await;

    inbound(&env.state, &mut session, &tx, json!({"type": "chat_message", "roomId": "demo-chat", "text": "   "})).await;
    assert_nothing(&mut rx).await;

    inbound(&env.state, &mut session, &tx, json!({"type": "chat_message", "roomId": "demo-chat", "message": "  hey "})).await;
    let ServerMessage::ChatMessage { text, name, .. } = recv(&mut rx).await else {
        panic!("expected chat");
    };
    assert_eq!(text, "hey");
    assert_eq!(name, "Guest");
}

#[tokio::test]
async fn join_with_backlogged_queue_reports_unavailable() {
    let env = test_helpers::test_env();
    let mut session = Session::anonymous();
    let (tx, mut rx) = mpsc::channel(1);
    inbound(&env.state, &mut session, &tx, json!({"type": "join_room", "roomId": "demo-a"})).await;

    let replies = inbound(&env.state, &mut session, &tx, json!({"type": "join_room", "roomId": "demo-b"})).await;
    let [ServerMessage::Error { code, retryable, room_id, .. }] = replies.as_slice() else {
        panic!("expected one error, got {replies:?}");
    };
    assert_eq!(code, "E_UNAVAILABLE");
    assert!(*retryable);
    assert_eq!(room_id.as_deref(), Some("demo-b"));
    assert!(!session.joined.contains("demo-b"));

    // Once the queue drains the same join goes through.
    assert!(matches!(recv(&mut rx).await, ServerMessage::RoomState { .. }));
    assert!(inbound(&env.state, &mut session, &tx, json!({"type": "join_room", "roomId": "demo-b"})).await.is_empty());
    assert!(session.joined.contains("demo-b"));
}

#[tokio::test]
async fn persistence_failure_is_reported_to_sender_only() {
    let env = test_helpers::test_env();
    let room_id = test_helpers::seed_room(&env, "flaky").await;
    let state = AppState { store: Arc::new(FailingStore), ..env.state.clone() };

    let mut sender = Session::authenticated("u1".into(), "Ada".into());
    let mut peer = Session::authenticated("u2".into(), "Bob".into());
    let (sender_tx, mut sender_rx) = mpsc::channel(8);
    let (peer_tx, mut peer_rx) = mpsc::channel(8);
    inbound(&state, &mut sender, &sender_tx, json!({"type": "join_room", "roomId": room_id})).await;
    inbound(&state, &mut peer, &peer_tx, json!({"type": "join_room", "roomId": room_id})).await;
    recv(&mut sender_rx).await;
    recv(&mut peer_rx).await;

    let draw = json!({"type": "draw", "roomId": room_id, "shape": rect_json(1.0)});
    let replies = inbound(&state, &mut sender, &sender_tx, draw).await;
    let [ServerMessage::Error { code, retryable, room_id: err_room, .. }] = replies.as_slice() else {
        panic!("expected one error, got {replies:?}");
    };
    assert_eq!(code, "E_PERSISTENCE");
    assert!(*retryable);
    assert_eq!(err_room.as_deref(), Some(room_id.as_str()));

    assert!(matches!(recv(&mut sender_rx).await, ServerMessage::Draw { .. }));
    assert!(matches!(recv(&mut peer_rx).await, ServerMessage::Draw { .. }));
}

// =============================================================================
// END TO END
// =============================================================================

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_server(env: &TestEnv) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    let app = crate::routes::app(env.state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server failed");
    });
    addr
}

async fn connect(addr: SocketAddr, token: Option<&str>) -> Client {
    let url = match token {
        Some(token) => format!("ws://{addr}/ws?token={token}"),
        None => format!("ws://{addr}/ws"),
    };
    let (client, _) = tokio_tungstenite::connect_async(url).await.expect("connect");
    client
}

async fn send(client: &mut Client, value: serde_json::Value) {
    client.send(WsMessage::Text(value.to_string().into())).await.expect("send");
}

async fn next_message(client: &mut Client) -> ServerMessage {
    loop {
        let msg = timeout(Duration::from_secs(2), client.next())
            .await
            .expect("receive timed out")
            .expect("stream ended")
            .expect("websocket error");
        if let WsMessage::Text(text) = msg {
            return protocol::decode_server(text.as_str()).expect("server sent valid json");
        }
    }
}

#[tokio::test]
async fn guests_share_a_demo_room() {
    let env = test_helpers::test_env();
    let addr = spawn_server(&env).await;

    let mut a = connect(addr, None).await;
    let mut b = connect(addr, None).await;
    let ServerMessage::Connected { connection_id: a_id, demo, display_name, .. } = next_message(&mut a).await else {
        panic!("expected connected");
    };
    assert!(demo);
    assert_eq!(display_name, "Guest");
    assert!(matches!(next_message(&mut b).await, ServerMessage::Connected { .. }));

    send(&mut a, json!({"type": "join_room", "roomId": "demo-e2e"})).await;
    assert!(matches!(next_message(&mut a).await, ServerMessage::RoomState { .. }));
    send(&mut b, json!({"type": "join_room", "roomId": "demo-e2e"})).await;
    assert!(matches!(next_message(&mut b).await, ServerMessage::RoomState { .. }));

    send(&mut a, json!({"type": "draw", "roomId": "demo-e2e", "shape": rect_json(7.0)})).await;
    for client in [&mut a, &mut b] {
        let ServerMessage::Draw { shape, connection_id, .. } = next_message(client).await else {
            panic!("expected draw");
        };
        assert_eq!(shape, rect(7.0));
        assert_eq!(connection_id, a_id);
    }

    send(&mut a, json!({"type": "ping", "data": 5})).await;
    assert_eq!(next_message(&mut a).await, ServerMessage::Pong { data: json!(5) });
    assert!(env.store.list_drawings("demo-e2e", 10, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn binary_frames_are_dropped_and_connection_stays_open() {
    let env = test_helpers::test_env();
    let addr = spawn_server(&env).await;
    let mut client = connect(addr, None).await;
    assert!(matches!(next_message(&mut client).await, ServerMessage::Connected { .. }));

    client.send(WsMessage::Binary(vec![1, 2, 3].into())).await.expect("send binary");
    send(&mut client, json!({"type": "ping", "data": "after-binary"})).await;
    assert_eq!(next_message(&mut client).await, ServerMessage::Pong { data: json!("after-binary") });
}

#[tokio::test]
async fn invalid_token_is_closed_with_policy_violation() {
    let env = test_helpers::test_env();
    let addr = spawn_server(&env).await;
    let mut client = connect(addr, Some("not-a-token")).await;

    let msg = timeout(Duration::from_secs(2), client.next())
        .await
        .expect("receive timed out")
        .expect("stream ended")
        .expect("websocket error");
    let WsMessage::Close(Some(frame)) = msg else {
        panic!("expected close frame, got {msg:?}");
    };
    assert_eq!(u16::from(frame.code), 1008);
    assert_eq!(frame.reason.as_str(), "Invalid token");
}

#[tokio::test]
async fn authenticated_user_replays_and_persists() {
    let env = test_helpers::test_env();
    let room_id = test_helpers::seed_room(&env, "studio").await;
    let user = env.identity.register(Some("Ada")).await;
    env.store.append_drawing(&room_id, &rect(1.0), Some(&user.user_id)).await.unwrap();
    let addr = spawn_server(&env).await;

    let mut client = connect(addr, Some(&user.token)).await;
    let ServerMessage::Connected { user_id, display_name, demo, .. } = next_message(&mut client).await else {
        panic!("expected connected");
    };
    assert_eq!(user_id.as_deref(), Some(user.user_id.as_str()));
    assert_eq!(display_name, "Ada");
    assert!(!demo);

    send(&mut client, json!({"type": "join_room", "roomId": room_id})).await;
    let ServerMessage::RoomState { shapes, .. } = next_message(&mut client).await else {
        panic!("expected room_state");
    };
    assert_eq!(shapes, vec![rect(1.0)]);

    let stroke = json!({"type": "pencil", "path": [{"x": 0, "y": 0}, {"x": 3, "y": 4}], "color": "#f00"});
    send(&mut client, json!({"type": "draw", "roomId": room_id, "shape": stroke})).await;
    assert!(matches!(next_message(&mut client).await, ServerMessage::Draw { .. }));

    let stored = env.store.list_drawings(&room_id, 10, 0).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(
        stored[1],
        Shape::Freehand {
            path: vec![Point::new(0.0, 0.0), Point::new(3.0, 4.0)],
            color: "#f00".into(),
            stroke_width: 2.0,
        }
    );

    client.close(None).await.expect("close");
    timeout(Duration::from_secs(2), async {
        while env.state.rooms.read().await.contains_key(&room_id) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("room evicted after disconnect");
}
