use std::sync::Arc;

use socketioxide::SocketIo;

use happy_api::config::AppConfig;
use happy_api::{build_router, register_socket_handlers, run_migrations, AppState};
use happy_shared::clients::db::{create_pool, get_conn};
use happy_shared::middleware::{init_metrics, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("happy-api");

    let config = AppConfig::load()?;
    let port = config.port;

    let db = create_pool(&config.database_url(), config.pool_settings())?;
    if config.auto_migrate {
        let mut conn = get_conn(&db)?;
        run_migrations(&mut conn)?;
    }

    let metrics = init_metrics()?;

    // Socket.IO shares the HTTP listener; `io` stays in state for pushes from REST handlers
    let (sio_layer, io) = SocketIo::builder().build_layer();

    let state = Arc::new(AppState::new(db, config, io, metrics));
    register_socket_handlers(&state);

    let app = build_router(state, sio_layer);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "happy-api starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
