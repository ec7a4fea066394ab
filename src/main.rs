use diesel::r2d2::{self, ConnectionManager};
use module_plane_core::auth::jwt::JwtService;
use module_plane_core::config::Config;
use module_plane_core::module_plane::ModulePlane;
use module_plane_core::routes::build_router;
use module_plane_core::websocket::hub::Hub;
use module_plane_core::{AppState, db, init_tracing};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("fatal: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging());

    let manager = ConnectionManager::<diesel::PgConnection>::new(&config.pg_url);
    let pool = match r2d2::Pool::builder()
        .max_size(config.database_max_connections)
        .min_idle(Some(config.database_min_connections))
        .build(manager)
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("fatal: failed to build database pool: {}", e);
            std::process::exit(1);
        }
    };

    // Boot-fatal: an un-migrated schema must never serve traffic.
    if let Err(e) = db::run_migrations(&pool) {
        tracing::error!("fatal: migrations failed: {}", e);
        std::process::exit(1);
    }

    // Boot-fatal: a circular module dependency aborts the boot.
    let module_plane = match ModulePlane::boot(&config).await {
        Ok(mp) => mp,
        Err(e) => {
            tracing::error!("fatal: module plane boot failed: {}", e);
            std::process::exit(1);
        }
    };
    module_plane.attach_db(pool.clone());

    let jwt = Arc::new(JwtService::new(config.auth()));
    let hub = Arc::new(Hub::new(jwt.clone(), pool.clone(), module_plane.clone()));
    hub.spawn_client_push_forwarder();

    let state = AppState {
        db: pool,
        config: Arc::new(config.clone()),
        jwt,
        module_plane,
        hub,
    };

    let app = build_router(state);

    let addr: SocketAddr = config
        .server_address()
        .parse()
        .expect("SERVER_HOST:PORT must form a valid socket address");

    tracing::info!(address = %addr, "starting server");

    axum::Server::bind(&addr)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .expect("server error");
}
