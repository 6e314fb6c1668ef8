//! Canvas engine for the shared infinite whiteboard.
//!
//! This crate is compiled to WebAssembly and runs in the browser. It owns the
//! client side of a room: the local shape replica with undo/redo, the pan/zoom
//! viewport, eraser hit-testing, gesture handling, and rendering. The host
//! JavaScript layer wires DOM events to the engine and forwards the resulting
//! [`engine::Action`]s to the session controller.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Top-level engine and testable [`engine::EngineCore`] |
//! | [`store`] | Shape replica with snapshot undo/redo |
//! | [`viewport`] | Pan/zoom state and screen ↔ canvas conversion |
//! | [`input`] | Tools, input event types, and gesture state |
//! | [`hit`] | Eraser-vs-shape geometry |
//! | [`render`] | Drawing a shape list onto a 2D surface |
//! | [`consts`] | Shared numeric constants (zoom limits, history cap, etc.) |

pub mod consts;
pub mod engine;
pub mod hit;
pub mod input;
pub mod render;
pub mod store;
pub mod viewport;
