//! Shared shape model and JSON codec for the realtime room protocol.
//!
//! This crate owns the wire representation used by the `server`, the `cli`
//! session controller, and the `canvas` engine. Messages are decoded exactly
//! once at the boundary into the typed [`ClientMessage`] / [`ServerMessage`]
//! enums; nothing downstream inspects raw JSON.

mod message;
mod shape;

pub use message::{ChatEntry, ClientMessage, DEFAULT_DEMO_PREFIX, RoomId, ServerMessage, is_demo_room};
pub use shape::{
    DEFAULT_COLOR, DEFAULT_ERASER_WIDTH, DEFAULT_FONT_SIZE, DEFAULT_STROKE_WIDTH, Point, Shape, ShapeError,
};

/// Error returned by the decode and encode helpers.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The text was not valid JSON, named an unknown `type`, or lacked a required field.
    #[error("invalid message: {0}")]
    Json(#[from] serde_json::Error),
    /// The message parsed but carried a shape that breaks a shape invariant.
    #[error("invalid shape: {0}")]
    InvalidShape(#[from] ShapeError),
}

/// Decode and validate a client message.
///
/// # Errors
///
/// Returns [`CodecError::Json`] for malformed payloads and
/// [`CodecError::InvalidShape`] when a carried shape fails validation.
pub fn decode_client(text: &str) -> Result<ClientMessage, CodecError> {
    let message: ClientMessage = serde_json::from_str(text)?;
    if let Some(shape) = message.shape() {
        shape.validate()?;
    }
    Ok(message)
}

/// Decode a server message.
///
/// # Errors
///
/// Returns [`CodecError::Json`] for malformed payloads.
pub fn decode_server(text: &str) -> Result<ServerMessage, CodecError> {
    Ok(serde_json::from_str(text)?)
}

/// Encode a client message as JSON text.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if serialization fails.
pub fn encode_client(message: &ClientMessage) -> Result<String, CodecError> {
    Ok(serde_json::to_string(message)?)
}

/// Encode a server message as JSON text.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if serialization fails.
pub fn encode_server(message: &ServerMessage) -> Result<String, CodecError> {
    Ok(serde_json::to_string(message)?)
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
