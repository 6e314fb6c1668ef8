//! Persistence service — the durable drawing and chat log behind each room.
//!
//! DESIGN
//! ======
//! The broker talks to storage only through [`DrawingStore`]. Drawings are an
//! append-only log per room; the row order is the replay order. Erase removes
//! rows by value-equality of the stored shape, clear removes every row for
//! the room. Chats are append-only and replayed newest-N, oldest first.
//!
//! Two implementations ship: [`PgDrawingStore`] on `drawings`/`chats` tables,
//! and [`MemoryDrawingStore`] for tests and database-less development.
//!
//! ERROR HANDLING
//! ==============
//! Every failure surfaces as [`StoreError`]. The broker reports it to the
//! initiating connection and still fans the operation out to the room.

use std::collections::HashMap;

use protocol::{ChatEntry, Shape};
use sqlx::PgPool;
use sqlx::types::Json;
use tokio::sync::RwLock;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("stored payload is not a shape: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Durable log for drawing operations and chat.
///
/// `author_id` is the user id for authenticated sessions and `None` for
/// anonymous ones.
#[async_trait::async_trait]
pub trait DrawingStore: Send + Sync {
    async fn append_drawing(&self, room_id: &str, shape: &Shape, author_id: Option<&str>) -> Result<(), StoreError>;

    async fn append_chat(&self, room_id: &str, entry: &ChatEntry) -> Result<(), StoreError>;

    /// Shapes in stored order, starting at `offset`.
    async fn list_drawings(&self, room_id: &str, limit: i64, offset: i64) -> Result<Vec<Shape>, StoreError>;

    /// Remove every drawing in the room. Returns the number removed.
    async fn delete_all_drawings(&self, room_id: &str) -> Result<u64, StoreError>;

    /// Remove every drawing equal to `shape`. Returns the number removed.
    async fn delete_drawing(&self, room_id: &str, shape: &Shape) -> Result<u64, StoreError>;

    /// The `limit` most recent chats after skipping `offset` newer ones,
    /// returned oldest first.
    async fn list_chats(&self, room_id: &str, limit: i64, offset: i64) -> Result<Vec<ChatEntry>, StoreError>;
}

// =============================================================================
// POSTGRES
// =============================================================================

pub struct PgDrawingStore {
    pool: PgPool,
}

impl PgDrawingStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl DrawingStore for PgDrawingStore {
    async fn append_drawing(&self, room_id: &str, shape: &Shape, author_id: Option<&str>) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO drawings (room_id, payload, author_id) VALUES ($1, $2, $3)")
            .bind(room_id)
            .bind(Json(shape))
            .bind(author_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn append_chat(&self, room_id: &str, entry: &ChatEntry) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO chats (room_id, author_id, author_name, body, sent_at_ms) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(room_id)
        .bind(&entry.from)
        .bind(&entry.name)
        .bind(&entry.text)
        .bind(entry.ts)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_drawings(&self, room_id: &str, limit: i64, offset: i64) -> Result<Vec<Shape>, StoreError> {
        let rows = sqlx::query_as::<_, (serde_json::Value,)>(
            "SELECT payload FROM drawings WHERE room_id = $1 ORDER BY id ASC LIMIT $2 OFFSET $3",
        )
        .bind(room_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let mut shapes = Vec::with_capacity(rows.len());
        for (payload,) in rows {
            shapes.push(serde_json::from_value(payload)?);
        }
        Ok(shapes)
    }

    async fn delete_all_drawings(&self, room_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM drawings WHERE room_id = $1")
            .bind(room_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_drawing(&self, room_id: &str, shape: &Shape) -> Result<u64, StoreError> {
        // jsonb equality ignores key order and numeric formatting.
        let result = sqlx::query("DELETE FROM drawings WHERE room_id = $1 AND payload = $2")
            .bind(room_id)
            .bind(Json(shape))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn list_chats(&self, room_id: &str, limit: i64, offset: i64) -> Result<Vec<ChatEntry>, StoreError> {
        let rows = sqlx::query_as::<_, (String, String, String, i64)>(
            "SELECT author_id, author_name, body, sent_at_ms
             FROM (
                SELECT id, author_id, author_name, body, sent_at_ms
                FROM chats
                WHERE room_id = $1
                ORDER BY id DESC
                LIMIT $2 OFFSET $3
             ) recent
             ORDER BY id ASC",
        )
        .bind(room_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(from, name, text, ts)| ChatEntry { from, name, text, ts })
            .collect())
    }
}

// =============================================================================
// IN-MEMORY
// =============================================================================

#[derive(Default)]
struct RoomLog {
    drawings: Vec<Shape>,
    chats: Vec<ChatEntry>,
}

/// Process-local store. Contents vanish on restart.
#[derive(Default)]
pub struct MemoryDrawingStore {
    rooms: RwLock<HashMap<String, RoomLog>>,
}

impl MemoryDrawingStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Convert a non-negative `i64` window bound to an index, saturating.
fn to_index(value: i64) -> usize {
    usize::try_from(value.max(0)).unwrap_or(usize::MAX)
}

#[async_trait::async_trait]
impl DrawingStore for MemoryDrawingStore {
    async fn append_drawing(&self, room_id: &str, shape: &Shape, _author_id: Option<&str>) -> Result<(), StoreError> {
        let mut rooms = self.rooms.write().await;
        rooms.entry(room_id.to_owned()).or_default().drawings.push(shape.clone());
        Ok(())
    }

    async fn append_chat(&self, room_id: &str, entry: &ChatEntry) -> Result<(), StoreError> {
        let mut rooms = self.rooms.write().await;
        rooms.entry(room_id.to_owned()).or_default().chats.push(entry.clone());
        Ok(())
    }

    async fn list_drawings(&self, room_id: &str, limit: i64, offset: i64) -> Result<Vec<Shape>, StoreError> {
        let rooms = self.rooms.read().await;
        Ok(rooms.get(room_id).map_or_else(Vec::new, |log| {
            log.drawings
                .iter()
                .skip(to_index(offset))
                .take(to_index(limit))
                .cloned()
                .collect()
        }))
    }

    async fn delete_all_drawings(&self, room_id: &str) -> Result<u64, StoreError> {
        let mut rooms = self.rooms.write().await;
        let removed = rooms.get_mut(room_id).map_or(0, |log| {
            let n = log.drawings.len();
            log.drawings.clear();
            n
        });
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }

    async fn delete_drawing(&self, room_id: &str, shape: &Shape) -> Result<u64, StoreError> {
        let mut rooms = self.rooms.write().await;
        let removed = rooms.get_mut(room_id).map_or(0, |log| {
            let before = log.drawings.len();
            log.drawings.retain(|s| s != shape);
            before - log.drawings.len()
        });
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }

    async fn list_chats(&self, room_id: &str, limit: i64, offset: i64) -> Result<Vec<ChatEntry>, StoreError> {
        let rooms = self.rooms.read().await;
        let Some(log) = rooms.get(room_id) else {
            return Ok(Vec::new());
        };
        let end = log.chats.len().saturating_sub(to_index(offset));
        let start = end.saturating_sub(to_index(limit));
        Ok(log.chats[start..end].to_vec())
    }
}

#[cfg(test)]
#[path = "persistence_test.rs"]
mod tests;
