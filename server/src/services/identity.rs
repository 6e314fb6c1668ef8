//! Identity service — token → user id, user id → display name.
//!
//! ARCHITECTURE
//! ============
//! Tokens are issued elsewhere (the signup/login surface); the broker only
//! validates them once, at websocket upgrade, and never sees them again.
//! [`PgIdentity`] reads the `sessions`/`users` tables. [`MemoryIdentity`]
//! backs tests and database-less development, and can mint tokens itself.

use std::collections::HashMap;
use std::fmt::Write;

use rand::Rng;
use sqlx::{PgPool, Row};
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

/// Display name used when the identity service cannot resolve one.
pub const UNKNOWN_USER: &str = "Unknown User";

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait::async_trait]
pub trait Identity: Send + Sync {
    /// Map a bearer token to a user id. `Ok(None)` means the token is unknown
    /// or expired.
    async fn authenticate(&self, token: &str) -> Result<Option<String>, IdentityError>;

    async fn display_name(&self, user_id: &str) -> Result<Option<String>, IdentityError>;
}

/// Resolve a display name, falling back to [`UNKNOWN_USER`] when the user has
/// none or the lookup fails.
pub async fn display_name_or_fallback(identity: &dyn Identity, user_id: &str) -> String {
    match identity.display_name(user_id).await {
        Ok(Some(name)) if !name.trim().is_empty() => name,
        Ok(_) => UNKNOWN_USER.to_owned(),
        Err(e) => {
            warn!(%user_id, error = %e, "identity: display name lookup failed");
            UNKNOWN_USER.to_owned()
        }
    }
}

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a cryptographically random 32-byte hex token.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

// =============================================================================
// POSTGRES
// =============================================================================

pub struct PgIdentity {
    pool: PgPool,
}

impl PgIdentity {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl Identity for PgIdentity {
    async fn authenticate(&self, token: &str) -> Result<Option<String>, IdentityError> {
        let row = sqlx::query("SELECT user_id FROM sessions WHERE token = $1 AND expires_at > now()")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get::<Uuid, _>("user_id").to_string()))
    }

    async fn display_name(&self, user_id: &str) -> Result<Option<String>, IdentityError> {
        let Ok(id) = user_id.parse::<Uuid>() else {
            return Ok(None);
        };
        let row = sqlx::query("SELECT name FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get("name")))
    }
}

// =============================================================================
// IN-MEMORY
// =============================================================================

/// A user registered with [`MemoryIdentity::register`].
#[derive(Debug, Clone)]
pub struct Registered {
    pub user_id: String,
    pub token: String,
}

#[derive(Default)]
pub struct MemoryIdentity {
    tokens: RwLock<HashMap<String, String>>,
    names: RwLock<HashMap<String, Option<String>>>,
}

impl MemoryIdentity {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a user with an optional display name and issue a token for it.
    pub async fn register(&self, name: Option<&str>) -> Registered {
        let user_id = Uuid::new_v4().to_string();
        let token = generate_token();
        self.names.write().await.insert(user_id.clone(), name.map(str::to_owned));
        self.tokens.write().await.insert(token.clone(), user_id.clone());
        Registered { user_id, token }
    }
}

#[async_trait::async_trait]
impl Identity for MemoryIdentity {
    async fn authenticate(&self, token: &str) -> Result<Option<String>, IdentityError> {
        Ok(self.tokens.read().await.get(token).cloned())
    }

    async fn display_name(&self, user_id: &str) -> Result<Option<String>, IdentityError> {
        Ok(self.names.read().await.get(user_id).cloned().flatten())
    }
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;
