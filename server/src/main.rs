mod config;
mod db;
mod error;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use services::directory::{MemoryRoomDirectory, PgRoomDirectory, RoomDirectory};
use services::identity::{Identity, MemoryIdentity, PgIdentity};
use services::persistence::{DrawingStore, MemoryDrawingStore, PgDrawingStore};

const DEV_ROOM_SLUG: &str = "sandbox";

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("failed to load .env: {e}");
        }
    }
    tracing_subscriber::fmt::init();

    let config = config::Config::from_env();
    let port = config.port;

    let (store, identity, directory): (Arc<dyn DrawingStore>, Arc<dyn Identity>, Arc<dyn RoomDirectory>) =
        if let Some(database_url) = &config.database_url {
            let pool = db::init_pool(database_url, config.db_max_connections)
                .await
                .expect("database init failed");
            tracing::info!(max_connections = config.db_max_connections, "postgres collaborators ready");
            let store: Arc<dyn DrawingStore> = Arc::new(PgDrawingStore::new(pool.clone()));
            let identity: Arc<dyn Identity> = Arc::new(PgIdentity::new(pool.clone()));
            let directory: Arc<dyn RoomDirectory> = Arc::new(PgRoomDirectory::new(pool));
            (store, identity, directory)
        } else {
            tracing::warn!("DATABASE_URL not set, using in-memory collaborators");
            let identity = Arc::new(MemoryIdentity::new());
            let directory = Arc::new(MemoryRoomDirectory::new());
            if let Some(name) = &config.dev_user {
                seed_dev_user(&identity, directory.as_ref(), name).await;
            }
            let store: Arc<dyn DrawingStore> = Arc::new(MemoryDrawingStore::new());
            let identity: Arc<dyn Identity> = identity;
            let directory: Arc<dyn RoomDirectory> = directory;
            (store, identity, directory)
        };

    let state = state::AppState::new(config, store, identity, directory);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "sketchroom broker listening");
    axum::serve(listener, app).await.expect("server failed");
}

/// Register a development user and a `sandbox` room it owns, logging the
/// token so a local client can connect.
async fn seed_dev_user(identity: &MemoryIdentity, directory: &dyn RoomDirectory, name: &str) {
    let user = identity.register(Some(name)).await;
    let room = match directory.find_room_by_slug(DEV_ROOM_SLUG).await {
        Ok(Some(room)) => room,
        _ => match directory.create_room(DEV_ROOM_SLUG, Some(&user.user_id)).await {
            Ok(room) => room,
            Err(e) => {
                tracing::error!(error = %e, "failed to create dev room");
                return;
            }
        },
    };
    tracing::info!(
        user = name,
        token = %user.token,
        room_id = %room.id,
        slug = %room.slug,
        owner = room.owner_id.as_deref().unwrap_or("-"),
        "dev user ready"
    );
}
