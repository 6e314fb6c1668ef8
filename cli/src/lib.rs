//! Client session controller for sketchroom rooms.
//!
//! Owns one websocket connection to the broker and the local replica of the
//! joined room. Incoming broker messages are applied to a
//! [`canvas::engine::EngineCore`]; local edits are applied to the same engine
//! first and then forwarded as wire messages.
//!
//! | Module | Role |
//! |--------|------|
//! | [`session`] | Connection task: connect, join, ping, reconnect |
//! | [`replica`] | Local room state and the message ↔ store mapping |
//! | [`reconnect`] | Exponential backoff with jitter |
//! | [`throttle`] | Outgoing cursor rate limit |
//! | [`error`] | [`SessionError`] |

pub mod error;
pub mod reconnect;
pub mod replica;
pub mod session;
pub mod throttle;

pub use error::SessionError;
pub use replica::Replica;
pub use session::{Command, SessionConfig, SessionEvent, SessionHandle};
