//! Runtime configuration loaded from environment variables.
//!
//! Every knob has a default so a bare `cargo run` brings up a working
//! broker with in-memory collaborators. Values are read once at startup;
//! nothing re-reads the environment after [`Config::from_env`] returns.

use protocol::DEFAULT_DEMO_PREFIX;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_CLIENT_CHANNEL_CAPACITY: usize = 256;
const DEFAULT_REPLAY_CHAT_LIMIT: i64 = 50;
const DEFAULT_REPLAY_PAGE_SIZE: i64 = 1_000;

/// Broker configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP port the HTTP/websocket listener binds on `0.0.0.0`.
    pub port: u16,
    /// Postgres URL. `None` runs the broker on in-memory collaborators.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// Room ids starting with this prefix are demo rooms.
    pub demo_prefix: String,
    /// Bound on each connection's outbound queue. A full queue drops
    /// broadcasts for that connection only.
    pub client_channel_capacity: usize,
    /// Most recent chat lines replayed on join.
    pub replay_chat_limit: i64,
    /// Drawings fetched per query while loading a replay. The whole log is
    /// replayed; this only bounds each round trip.
    pub replay_page_size: i64,
    /// With in-memory collaborators, register this user and a `sandbox`
    /// room at startup so authenticated flows work without Postgres.
    pub dev_user: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: None,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            demo_prefix: DEFAULT_DEMO_PREFIX.to_owned(),
            client_channel_capacity: DEFAULT_CLIENT_CHANNEL_CAPACITY,
            replay_chat_limit: DEFAULT_REPLAY_CHAT_LIMIT,
            replay_page_size: DEFAULT_REPLAY_PAGE_SIZE,
            dev_user: None,
        }
    }
}

impl Config {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT", DEFAULT_PORT),
            database_url: env_string("DATABASE_URL"),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            demo_prefix: env_string("DEMO_ROOM_PREFIX").unwrap_or_else(|| DEFAULT_DEMO_PREFIX.to_owned()),
            client_channel_capacity: env_parse("CLIENT_CHANNEL_CAPACITY", DEFAULT_CLIENT_CHANNEL_CAPACITY).max(1),
            replay_chat_limit: env_parse("REPLAY_CHAT_LIMIT", DEFAULT_REPLAY_CHAT_LIMIT).max(0),
            replay_page_size: env_parse("REPLAY_PAGE_SIZE", DEFAULT_REPLAY_PAGE_SIZE).max(1),
            dev_user: env_string("DEV_USER"),
        }
    }

    /// Whether `room_id` names a demo room.
    #[must_use]
    pub fn is_demo_room(&self, room_id: &str) -> bool {
        protocol::is_demo_room(room_id, &self.demo_prefix)
    }
}

/// Parse an environment variable, falling back to `default` when it is
/// unset or does not parse.
pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Non-empty string variable.
fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
