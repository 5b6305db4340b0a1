//! Application state.

use std::sync::Arc;

use auth::JwtManager;
use inventory_store::InventoryStore;

use crate::config::Config;

/// Shared application state.
pub struct AppState<S: InventoryStore> {
    /// Server configuration.
    pub config: Config,
    /// Inventory store.
    pub store: S,
    /// Session token issuer and validator.
    pub jwt_manager: JwtManager,
}

impl<S: InventoryStore> AppState<S> {
    /// Creates new application state.
    pub fn new(config: Config, store: S, jwt_manager: JwtManager) -> Self {
        Self {
            config,
            store,
            jwt_manager,
        }
    }
}

/// Type alias for shared state.
pub type SharedState<S> = Arc<AppState<S>>;
