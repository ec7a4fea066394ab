pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod module_plane;
pub mod oauth;
pub mod routes;
pub mod schema;
pub mod websocket;

use auth::jwt::JwtService;
use config::Config;
use db::DbPool;
use module_plane::ModulePlane;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt};
use websocket::hub::Hub;

/// Process-wide shared state, cloned into every handler (every field is
/// itself cheap to clone — `DbPool` is a connection pool handle, the rest
/// are `Arc`s).
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Arc<Config>,
    pub jwt: Arc<JwtService>,
    pub module_plane: ModulePlane,
    pub hub: Arc<Hub>,
}

/// Sets up the global tracing subscriber:
/// `RUST_LOG`/`LOG_LEVEL`-driven filtering, JSON or pretty output chosen
/// by `LOG_FORMAT`. Module `log` IPC messages flow back through the same
/// subscriber tagged `target: "module"` rather than being printed raw.
pub fn init_tracing(config: &config::LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = fmt().with_env_filter(filter);
    if config.format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
