//! Per-connection session state.
//!
//! A [`Session`] is created once the upgrade request has been authenticated
//! (or accepted as an anonymous demo guest) and lives exactly as long as the
//! websocket task. It is owned by that task; the room registry only ever sees
//! the identity fields it needs to stamp outgoing broadcasts.

use std::collections::BTreeSet;

use protocol::{RoomId, ServerMessage};
use uuid::Uuid;

/// Display name for connections without a token.
pub const GUEST_NAME: &str = "Guest";

#[derive(Debug, Clone)]
pub struct Session {
    pub connection_id: Uuid,
    /// `None` for anonymous demo sessions.
    pub user_id: Option<String>,
    pub display_name: String,
    /// Rooms this connection has joined.
    pub joined: BTreeSet<RoomId>,
}

impl Session {
    #[must_use]
    pub fn authenticated(user_id: String, display_name: String) -> Self {
        Self { connection_id: Uuid::new_v4(), user_id: Some(user_id), display_name, joined: BTreeSet::new() }
    }

    #[must_use]
    pub fn anonymous() -> Self {
        Self { connection_id: Uuid::new_v4(), user_id: None, display_name: GUEST_NAME.to_owned(), joined: BTreeSet::new() }
    }

    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none()
    }

    /// Sender tag stamped on broadcasts: the user id, or `guest-<8 hex>`
    /// derived from the connection id for anonymous sessions.
    #[must_use]
    pub fn from(&self) -> String {
        match &self.user_id {
            Some(id) => id.clone(),
            None => {
                let simple = self.connection_id.simple().to_string();
                format!("guest-{}", &simple[..8])
            }
        }
    }

    /// Welcome message sent right after the upgrade.
    #[must_use]
    pub fn connected_message(&self) -> ServerMessage {
        ServerMessage::Connected {
            connection_id: self.connection_id,
            user_id: self.user_id.clone(),
            display_name: self.display_name.clone(),
            demo: self.is_anonymous(),
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
