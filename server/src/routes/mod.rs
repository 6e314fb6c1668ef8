//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! The broker exposes one websocket endpoint plus two unauthenticated probes:
//! `/health` for monitors and `/warmup` for clients that want to wake a
//! cold-started host before opening the socket.

pub mod ws;

use axum::Json;
use axum::Router;
use axum::routing::get;
use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(ws::handle_ws))
        .route("/health", get(health))
        .route("/warmup", get(warmup))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    let timestamp = OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();
    Json(json!({ "status": "healthy", "timestamp": timestamp }))
}

async fn warmup() -> &'static str {
    "ok"
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
