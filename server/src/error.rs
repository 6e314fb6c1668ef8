//! Broker error taxonomy and its wire form.
//!
//! Each variant maps to a stable `E_*` code via [`ErrorCode`]. Only some of
//! them ever reach a client: validation and membership errors are logged and
//! dropped, auth errors close the socket, and the rest become an `error`
//! message for the initiating connection.

use protocol::{CodecError, RoomId, ServerMessage};

use crate::services::directory::DirectoryError;
use crate::services::persistence::StoreError;

/// Stable, machine-readable error code for a failure.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("invalid message: {0}")]
    Validation(#[from] CodecError),
    #[error("not a member of room {0}")]
    Membership(RoomId),
    #[error("failed to persist operation: {0}")]
    Persistence(#[from] StoreError),
    #[error("room not found: {0}")]
    NotFound(RoomId),
    #[error("sign in to join room {0}")]
    AuthRequired(RoomId),
    #[error("room directory unavailable: {0}")]
    Directory(#[from] DirectoryError),
    #[error("connection too far behind to join room {0}, retry")]
    Backlogged(RoomId),
}

impl ErrorCode for BrokerError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Auth(_) => "E_AUTH",
            Self::Validation(_) => "E_VALIDATION",
            Self::Membership(_) => "E_NOT_MEMBER",
            Self::Persistence(_) => "E_PERSISTENCE",
            Self::NotFound(_) => "E_ROOM_NOT_FOUND",
            Self::AuthRequired(_) => "E_AUTH_REQUIRED",
            Self::Directory(_) | Self::Backlogged(_) => "E_UNAVAILABLE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Directory(_) | Self::Backlogged(_))
    }
}

impl BrokerError {
    /// Build the `error` message sent to the initiating connection.
    #[must_use]
    pub fn to_message(&self, room_id: Option<&str>) -> ServerMessage {
        ServerMessage::Error {
            code: self.error_code().to_owned(),
            message: self.to_string(),
            retryable: self.retryable(),
            room_id: room_id.map(str::to_owned),
        }
    }

    /// Whether the error is a client-side bug that is logged and dropped
    /// rather than reported.
    #[must_use]
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Membership(_))
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
