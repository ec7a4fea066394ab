pub mod auth;
pub mod modules;
pub mod oauth;
pub mod server;
pub mod users;

use crate::AppState;
use crate::middleware::auth::auth_gate;
use crate::middleware::logger::logger;
use crate::websocket::ws_handler;
use axum::Router;
use axum::middleware as axum_middleware;
use axum::routing::{any, get, post};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Assembles the full HTTP/WS surface: the static `/auth`, `/users`,
/// `/oauth`, `/server` routes and the WebSocket upgrade are known at
/// compile time; every module-declared HTTP route rides the `/*path`
/// catch-all, since C4's registry only fills in at runtime.
pub fn build_router(state: AppState) -> Router {
    let cors_origins = state.config.server().cors_origins;
    let cors = if cors_origins.is_empty() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<_> = cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(tower_http::cors::Any).allow_headers(tower_http::cors::Any)
    };

    let public = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register))
        .route("/oauth/google/device", post(oauth::google_device_start))
        .route("/oauth/google/device/poll", post(oauth::google_device_poll))
        .route("/oauth/google/web", get(oauth::google_web_start))
        .route("/oauth/google/web/callback", get(oauth::google_web_callback))
        .route("/oauth/discord/web", get(oauth::discord_web_start))
        .route("/oauth/discord/web/callback", get(oauth::discord_web_callback))
        .route("/server/health", get(server::health));

    let protected = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/verify", post(auth::verify))
        .route("/users/me", get(users::me))
        .route("/users/:id/permissions", get(users::permissions).post(users::grant_permission))
        .route("/server/modules", get(server::modules))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_gate));

    let module_dispatch = Router::new()
        .route("/*path", any(modules::dispatch))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_gate));

    Router::new()
        .route("/ws", get(ws_handler))
        .merge(public)
        .merge(protected)
        .merge(module_dispatch)
        .layer(axum_middleware::from_fn(logger))
        .layer(cors)
        .with_state(state)
}
