//! Inventory back office server.
//!
//! An axum service over an [`InventoryStore`]: products, categories and the
//! stock ledger for editors, user and credential administration for admins,
//! and an activity log of every authenticated request.

pub mod api;
pub mod config;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;

use std::sync::Arc;

use auth::{JwtConfig, JwtManager};
use axum::{Router, middleware::from_fn_with_state};
use inventory_store::InventoryStore;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::Config;
use crate::state::{AppState, SharedState};

/// Creates the application router with all routes and middleware configured.
///
/// Principal resolution runs first so that the activity recorder and the
/// per-route role gates see the caller.
pub fn create_app<S: InventoryStore + 'static>(state: SharedState<S>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    api::create_router::<S>()
        .layer(from_fn_with_state(
            state.clone(),
            middleware::record_activity::<S>,
        ))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::resolve_principal::<S>,
        ))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Creates the application state with the given configuration and store.
pub fn create_state<S: InventoryStore>(config: Config, store: S) -> SharedState<S> {
    let jwt_config = JwtConfig::new(config.jwt_secret.clone())
        .with_expiration_hours(config.jwt_expiration_hours);

    Arc::new(AppState::new(config, store, JwtManager::new(jwt_config)))
}

/// Initializes tracing with the given log level.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
