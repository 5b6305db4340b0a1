//! Inventory back office server binary.

use std::net::SocketAddr;

use inventory_server::{
    config::Config, create_app, create_state, init_tracing, services::UserAdmin,
};
use inventory_store::{InventoryStore, MemoryInventoryStore, SqliteInventoryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env if present
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    init_tracing(&config.log_level);

    if config.jwt_secret_generated {
        tracing::warn!("INVENTORY_JWT_SECRET not set; using a random secret, sessions end on restart");
    }

    tracing::info!(dev_mode = config.dev_mode, "Starting inventory server");

    match config.database_url.clone() {
        Some(url) if url.starts_with("sqlite:") => {
            let store = SqliteInventoryStore::connect(&url).await?;
            tracing::info!("Using SQLite store");
            serve(config, store).await
        }
        Some(url) => anyhow::bail!("Unsupported DATABASE_URL scheme: {url}"),
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store, data is lost on exit");
            serve(config, MemoryInventoryStore::new()).await
        }
    }
}

async fn serve<S: InventoryStore + 'static>(config: Config, store: S) -> anyhow::Result<()> {
    if let Some((email, password)) = config.bootstrap_admin() {
        UserAdmin::new(&store).bootstrap_admin(email, password).await?;
    }

    let addr: SocketAddr = config.server_addr().parse()?;
    let state = create_state(config, store);
    let app = create_app(state);

    tracing::info!(addr = %addr, "Server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
