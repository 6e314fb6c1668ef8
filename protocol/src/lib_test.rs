use serde_json::json;
use uuid::Uuid;

use super::*;

fn rect() -> Shape {
    Shape::Rect {
        x: 0.0,
        y: 0.0,
        width: 10.0,
        height: 10.0,
        color: DEFAULT_COLOR.to_owned(),
        stroke_width: DEFAULT_STROKE_WIDTH,
    }
}

// =============================================================
// Client messages
// =============================================================

#[test]
fn decode_join_room_uses_camel_case_room_id() {
    let msg = decode_client(r#"{"type":"join_room","roomId":"r1"}"#).expect("join");
    assert_eq!(msg, ClientMessage::JoinRoom { room_id: "r1".into() });
    assert_eq!(msg.room_id(), Some("r1"));
    assert_eq!(msg.kind(), "join_room");
}

#[test]
fn decode_draw_wraps_shape() {
    let msg = decode_client(r#"{"type":"draw","roomId":"r1","shape":{"type":"rect","x":0,"y":0,"width":10,"height":10}}"#)
        .expect("draw");
    assert_eq!(msg, ClientMessage::Draw { room_id: "r1".into(), shape: rect() });
    assert_eq!(msg.shape(), Some(&rect()));
}

#[test]
fn decode_ping_without_data_defaults_to_null() {
    let msg = decode_client(r#"{"type":"ping"}"#).expect("ping");
    assert_eq!(msg, ClientMessage::Ping { data: serde_json::Value::Null });
    assert_eq!(msg.room_id(), None);
}

#[test]
fn decode_chat_accepts_message_alias() {
    let msg = decode_client(r#"{"type":"chat_message","roomId":"r1","message":"hello"}"#).expect("chat");
    assert_eq!(msg, ClientMessage::ChatMessage { room_id: "r1".into(), text: "hello".into() });
}

#[test]
fn decode_rejects_invalid_json() {
    let err = decode_client("invalid json {{{").expect_err("should fail");
    assert!(matches!(err, CodecError::Json(_)));
}

#[test]
fn decode_rejects_unknown_type() {
    let err = decode_client(r#"{"type":"unknown_type","data":{}}"#).expect_err("should fail");
    assert!(matches!(err, CodecError::Json(_)));
}

#[test]
fn decode_rejects_missing_room_id() {
    let err = decode_client(r#"{"type":"clear_all"}"#).expect_err("should fail");
    assert!(matches!(err, CodecError::Json(_)));
}

#[test]
fn decode_rejects_draw_with_empty_path() {
    let err = decode_client(r#"{"type":"draw","roomId":"r1","shape":{"type":"freehand","path":[]}}"#)
        .expect_err("should fail");
    assert!(matches!(err, CodecError::InvalidShape(ShapeError::EmptyPath)));
}

#[test]
fn encoded_client_message_carries_type_tag() {
    let text = encode_client(&ClientMessage::Cursor { room_id: "r1".into(), x: 1.5, y: 2.5 }).expect("encode");
    let value: serde_json::Value = serde_json::from_str(&text).expect("json");
    assert_eq!(value, json!({"type": "cursor", "roomId": "r1", "x": 1.5, "y": 2.5}));
}

// =============================================================
// Server messages
// =============================================================

#[test]
fn server_draw_carries_origin() {
    let connection_id = Uuid::new_v4();
    let msg = ServerMessage::Draw {
        room_id: "r1".into(),
        shape: rect(),
        from: "user-1".into(),
        name: "Ada".into(),
        connection_id,
    };
    let text = encode_server(&msg).expect("encode");
    let value: serde_json::Value = serde_json::from_str(&text).expect("json");
    assert_eq!(value["type"], "draw");
    assert_eq!(value["connectionId"], json!(connection_id));
    assert_eq!(decode_server(&text).expect("decode").origin(), Some(connection_id));
}

#[test]
fn error_message_omits_absent_room() {
    let msg = ServerMessage::Error {
        code: "E_VALIDATION".into(),
        message: "bad".into(),
        retryable: false,
        room_id: None,
    };
    let value = serde_json::to_value(&msg).expect("serialize");
    assert!(value.get("roomId").is_none());
    assert_eq!(msg.room_id(), None);
}

#[test]
fn room_state_chats_default_to_empty() {
    let msg = decode_server(r#"{"type":"room_state","roomId":"r1","shapes":[]}"#).expect("decode");
    assert_eq!(msg, ServerMessage::RoomState { room_id: "r1".into(), shapes: vec![], chats: vec![] });
}

#[test]
fn demo_prefix_detection() {
    assert!(is_demo_room("demo-abc", DEFAULT_DEMO_PREFIX));
    assert!(!is_demo_room("abc-demo", DEFAULT_DEMO_PREFIX));
}
