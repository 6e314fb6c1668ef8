use super::*;
use protocol::Point;

fn rect(x: f64) -> Shape {
    Shape::Rect { x, y: 0.0, width: 10.0, height: 10.0, color: "#fff".into(), stroke_width: 2.0 }
}

fn chat(text: &str, ts: i64) -> ChatEntry {
    ChatEntry { from: "u1".into(), name: "Ada".into(), text: text.into(), ts }
}

// =============================================================================
// Drawings
// =============================================================================

#[tokio::test]
async fn drawings_list_in_append_order() {
    let store = MemoryDrawingStore::new();
    for x in [3.0, 1.0, 2.0] {
        store.append_drawing("r1", &rect(x), Some("u1")).await.unwrap();
    }
    let shapes = store.list_drawings("r1", 100, 0).await.unwrap();
    assert_eq!(shapes, vec![rect(3.0), rect(1.0), rect(2.0)]);
}

#[tokio::test]
async fn drawings_respect_limit_and_offset() {
    let store = MemoryDrawingStore::new();
    for x in 0..5 {
        store.append_drawing("r1", &rect(f64::from(x)), None).await.unwrap();
    }
    let page = store.list_drawings("r1", 2, 1).await.unwrap();
    assert_eq!(page, vec![rect(1.0), rect(2.0)]);
    assert!(store.list_drawings("r1", 2, 10).await.unwrap().is_empty());
    assert!(store.list_drawings("r1", -1, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn rooms_are_isolated() {
    let store = MemoryDrawingStore::new();
    store.append_drawing("r1", &rect(1.0), None).await.unwrap();
    assert!(store.list_drawings("r2", 10, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_all_empties_only_that_room() {
    let store = MemoryDrawingStore::new();
    store.append_drawing("r1", &rect(1.0), None).await.unwrap();
    store.append_drawing("r1", &rect(2.0), None).await.unwrap();
    store.append_drawing("r2", &rect(3.0), None).await.unwrap();

    assert_eq!(store.delete_all_drawings("r1").await.unwrap(), 2);
    assert!(store.list_drawings("r1", 10, 0).await.unwrap().is_empty());
    assert_eq!(store.list_drawings("r2", 10, 0).await.unwrap().len(), 1);
    assert_eq!(store.delete_all_drawings("missing").await.unwrap(), 0);
}

#[tokio::test]
async fn delete_drawing_removes_every_equal_copy() {
    let store = MemoryDrawingStore::new();
    let stroke = Shape::Freehand {
        path: vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)],
        color: "#f00".into(),
        stroke_width: 2.0,
    };
    store.append_drawing("r1", &stroke, None).await.unwrap();
    store.append_drawing("r1", &rect(1.0), None).await.unwrap();
    store.append_drawing("r1", &stroke, None).await.unwrap();

    assert_eq!(store.delete_drawing("r1", &stroke).await.unwrap(), 2);
    assert_eq!(store.list_drawings("r1", 10, 0).await.unwrap(), vec![rect(1.0)]);
    assert_eq!(store.delete_drawing("r1", &stroke).await.unwrap(), 0);
}

// =============================================================================
// Chats
// =============================================================================

#[tokio::test]
async fn chats_return_newest_window_oldest_first() {
    let store = MemoryDrawingStore::new();
    for i in 0..5 {
        store.append_chat("r1", &chat(&format!("m{i}"), i)).await.unwrap();
    }
    let recent = store.list_chats("r1", 3, 0).await.unwrap();
    let texts: Vec<&str> = recent.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["m2", "m3", "m4"]);

    let older = store.list_chats("r1", 3, 3).await.unwrap();
    let texts: Vec<&str> = older.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["m0", "m1"]);
}

#[tokio::test]
async fn chats_for_unknown_room_are_empty() {
    let store = MemoryDrawingStore::new();
    assert!(store.list_chats("nope", 50, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn chats_offset_past_end_is_empty() {
    let store = MemoryDrawingStore::new();
    store.append_chat("r1", &chat("hi", 1)).await.unwrap();
    assert!(store.list_chats("r1", 10, 5).await.unwrap().is_empty());
}

// =============================================================================
// Postgres (opt-in)
// =============================================================================

#[cfg(feature = "live-db-tests")]
#[tokio::test]
async fn pg_store_round_trips_drawings_and_chats() {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required for live-db-tests");
    let pool = crate::db::init_pool(&url, 2).await.expect("init pool");
    let store = PgDrawingStore::new(pool);
    let room = format!("live-{}", uuid::Uuid::new_v4());

    store.append_drawing(&room, &rect(1.0), Some("u1")).await.unwrap();
    store.append_drawing(&room, &rect(2.0), None).await.unwrap();
    assert_eq!(store.list_drawings(&room, 10, 0).await.unwrap(), vec![rect(1.0), rect(2.0)]);
    assert_eq!(store.delete_drawing(&room, &rect(1.0)).await.unwrap(), 1);
    assert_eq!(store.delete_all_drawings(&room).await.unwrap(), 1);

    store.append_chat(&room, &chat("a", 1)).await.unwrap();
    store.append_chat(&room, &chat("b", 2)).await.unwrap();
    let chats = store.list_chats(&room, 1, 0).await.unwrap();
    assert_eq!(chats, vec![chat("b", 2)]);
}
