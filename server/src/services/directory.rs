//! Room directory — creation and lookup of durable rooms.
//!
//! The broker consults the directory on `join_room` for non-demo rooms so a
//! typo'd or deleted room id is refused instead of silently creating a new
//! shared canvas. Demo rooms never touch the directory.

use std::collections::HashMap;

use protocol::RoomId;
use sqlx::{PgPool, Row};
use tokio::sync::RwLock;
use uuid::Uuid;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("room slug already taken: {0}")]
    SlugTaken(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Row returned from room queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomRow {
    pub id: RoomId,
    pub slug: String,
    pub owner_id: Option<String>,
}

#[async_trait::async_trait]
pub trait RoomDirectory: Send + Sync {
    /// Create a room with a fresh id.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::SlugTaken`] if the slug is in use.
    async fn create_room(&self, slug: &str, owner_id: Option<&str>) -> Result<RoomRow, DirectoryError>;

    async fn find_room(&self, room_id: &str) -> Result<Option<RoomRow>, DirectoryError>;

    async fn find_room_by_slug(&self, slug: &str) -> Result<Option<RoomRow>, DirectoryError>;
}

// =============================================================================
// POSTGRES
// =============================================================================

pub struct PgRoomDirectory {
    pool: PgPool,
}

impl PgRoomDirectory {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_room(row: &sqlx::postgres::PgRow) -> RoomRow {
    RoomRow {
        id: row.get("id"),
        slug: row.get("slug"),
        owner_id: row.get::<Option<Uuid>, _>("owner_id").map(|id| id.to_string()),
    }
}

#[async_trait::async_trait]
impl RoomDirectory for PgRoomDirectory {
    async fn create_room(&self, slug: &str, owner_id: Option<&str>) -> Result<RoomRow, DirectoryError> {
        let id = Uuid::new_v4().to_string();
        let owner = owner_id.and_then(|o| o.parse::<Uuid>().ok());
        let result = sqlx::query("INSERT INTO rooms (id, slug, owner_id) VALUES ($1, $2, $3)")
            .bind(&id)
            .bind(slug)
            .bind(owner)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(RoomRow { id, slug: slug.to_owned(), owner_id: owner.map(|o| o.to_string()) }),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(DirectoryError::SlugTaken(slug.to_owned())),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_room(&self, room_id: &str) -> Result<Option<RoomRow>, DirectoryError> {
        let row = sqlx::query("SELECT id, slug, owner_id FROM rooms WHERE id = $1")
            .bind(room_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_room))
    }

    async fn find_room_by_slug(&self, slug: &str) -> Result<Option<RoomRow>, DirectoryError> {
        let row = sqlx::query("SELECT id, slug, owner_id FROM rooms WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_room))
    }
}

// =============================================================================
// IN-MEMORY
// =============================================================================

#[derive(Default)]
pub struct MemoryRoomDirectory {
    rooms: RwLock<HashMap<RoomId, RoomRow>>,
}

impl MemoryRoomDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl RoomDirectory for MemoryRoomDirectory {
    async fn create_room(&self, slug: &str, owner_id: Option<&str>) -> Result<RoomRow, DirectoryError> {
        let mut rooms = self.rooms.write().await;
        if rooms.values().any(|r| r.slug == slug) {
            return Err(DirectoryError::SlugTaken(slug.to_owned()));
        }
        let row = RoomRow { id: Uuid::new_v4().to_string(), slug: slug.to_owned(), owner_id: owner_id.map(str::to_owned) };
        rooms.insert(row.id.clone(), row.clone());
        Ok(row)
    }

    async fn find_room(&self, room_id: &str) -> Result<Option<RoomRow>, DirectoryError> {
        Ok(self.rooms.read().await.get(room_id).cloned())
    }

    async fn find_room_by_slug(&self, slug: &str) -> Result<Option<RoomRow>, DirectoryError> {
        Ok(self.rooms.read().await.values().find(|r| r.slug == slug).cloned())
    }
}

#[cfg(test)]
#[path = "directory_test.rs"]
mod tests;
