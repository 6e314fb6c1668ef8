//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the three external collaborators (drawing store, identity,
//! room directory) behind trait objects, plus the live room map. Each live
//! room owns its membership set behind one async mutex; that mutex is the
//! room-scoped serialization point for persist-then-fan-out.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use protocol::{RoomId, ServerMessage};
use tokio::sync::{Mutex, RwLock, mpsc};
use uuid::Uuid;

use crate::config::Config;
use crate::services::directory::RoomDirectory;
use crate::services::identity::Identity;
use crate::services::persistence::DrawingStore;

// =============================================================================
// ROOM
// =============================================================================

/// Live state for one room. Exists only while at least one member is joined.
pub struct Room {
    /// Joined connections: `connection_id` -> sender for outgoing messages.
    pub members: Mutex<HashMap<Uuid, mpsc::Sender<ServerMessage>>>,
    /// Set once the last member leaves. A closed room is never reused; a
    /// joiner that finds one retries against a fresh entry.
    closed: AtomicBool,
}

impl Room {
    #[must_use]
    pub fn new() -> Self {
        Self { members: Mutex::new(HashMap::new()), closed: AtomicBool::new(false) }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Mark the room closed. Callers hold the `members` lock.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl Default for Room {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn DrawingStore>,
    pub identity: Arc<dyn Identity>,
    pub directory: Arc<dyn RoomDirectory>,
    pub rooms: Arc<RwLock<HashMap<RoomId, Arc<Room>>>>,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: Config,
        store: Arc<dyn DrawingStore>,
        identity: Arc<dyn Identity>,
        directory: Arc<dyn RoomDirectory>,
    ) -> Self {
        Self { config: Arc::new(config), store, identity, directory, rooms: Arc::new(RwLock::new(HashMap::new())) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
