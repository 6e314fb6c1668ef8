//! Domain services used by the websocket route.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic and persistence concerns so route
//! handlers can stay focused on protocol translation and auth plumbing.
//! `persistence`, `identity`, and `directory` are the external collaborators,
//! each a trait with a Postgres and an in-memory implementation; `room` is
//! the broker proper and `session` the per-connection identity it stamps on
//! every broadcast.

pub mod directory;
pub mod identity;
pub mod persistence;
pub mod room;
pub mod session;
