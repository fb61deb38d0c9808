mod config;
mod db;
mod routes;
mod services;
mod state;
mod store;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;
use crate::store::postgres::PgChatStore;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env().expect("invalid configuration");

    let pool = db::init_pool(&config.database_url, config.db_max_connections)
        .await
        .expect("database init failed");

    let state = state::AppState::new(Arc::new(PgChatStore::new(pool)), config.realtime);

    // Spawn background typing expiry sweep.
    let _typing_sweep = services::typing::spawn_typing_sweep(state.clone());

    let app = routes::app(state, &config.cors_allow_origins);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .expect("failed to bind");

    tracing::info!(
        port = config.port,
        max_attachment_bytes = config.realtime.max_attachment_bytes,
        "boardchat listening"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server failed");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
