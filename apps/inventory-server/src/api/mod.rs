//! API endpoints.
//!
//! Routes are grouped by the lowest role they require. Each group carries its
//! own [`RoleGate`] as a route layer, so unmatched paths still 404 rather than
//! 401.

pub mod activity;
pub mod api_token;
pub mod auth;
pub mod category;
pub mod product;
pub mod profile;
pub mod signup_code;
pub mod transaction;
pub mod user;

use std::sync::Arc;

use api_protocol::HealthResponse;
use axum::{
    Json, Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use entities::Role;
use inventory_store::InventoryStore;

use crate::middleware::{RoleGate, require_role};
use crate::state::AppState;

/// Creates the API router with all endpoints.
pub fn create_router<S: InventoryStore + 'static>() -> Router<Arc<AppState<S>>> {
    Router::new()
        .merge(public_routes())
        .merge(user_routes())
        .merge(editor_routes())
        .merge(admin_routes())
        .route("/health", get(health_check))
}

fn public_routes<S: InventoryStore + 'static>() -> Router<Arc<AppState<S>>> {
    Router::new()
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/register", post(auth::register))
        .route(
            "/api/auth/second-factor/verify",
            post(auth::verify_second_factor),
        )
}

fn user_routes<S: InventoryStore + 'static>() -> Router<Arc<AppState<S>>> {
    Router::new()
        // Session endpoints
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/logout", post(auth::logout))
        // Profile endpoints
        .route("/api/profile/get", post(profile::get_profile))
        .route("/api/profile/update", post(profile::update_profile))
        .route(
            "/api/profile/second-factor/enable",
            post(profile::enable_second_factor),
        )
        .route(
            "/api/profile/second-factor/confirm",
            post(profile::confirm_second_factor),
        )
        .route(
            "/api/profile/second-factor/disable",
            post(profile::disable_second_factor),
        )
        // Read-only catalog endpoints
        .route("/api/product/list", post(product::list_products))
        .route("/api/product/get", post(product::get_product))
        .route("/api/category/list", post(category::list_categories))
        .route("/api/category/get", post(category::get_category))
        .route("/api/transaction/list", post(transaction::list_transactions))
        .route("/api/transaction/get", post(transaction::get_transaction))
        .route_layer(from_fn_with_state(
            RoleGate::at_least(Role::User),
            require_role,
        ))
}

fn editor_routes<S: InventoryStore + 'static>() -> Router<Arc<AppState<S>>> {
    Router::new()
        // Product endpoints
        .route("/api/product/create", post(product::create_product))
        .route("/api/product/update", post(product::update_product))
        .route("/api/product/delete", post(product::delete_product))
        // Category endpoints
        .route("/api/category/create", post(category::create_category))
        .route("/api/category/update", post(category::update_category))
        .route("/api/category/delete", post(category::delete_category))
        .route(
            "/api/category/attach-product",
            post(category::attach_product),
        )
        .route(
            "/api/category/detach-product",
            post(category::detach_product),
        )
        // Ledger endpoints
        .route("/api/transaction/record", post(transaction::record_transaction))
        .route("/api/transaction/amend", post(transaction::amend_transaction))
        .route("/api/transaction/reverse", post(transaction::reverse_transaction))
        .route_layer(from_fn_with_state(
            RoleGate::new([Role::Editor, Role::Admin]),
            require_role,
        ))
}

fn admin_routes<S: InventoryStore + 'static>() -> Router<Arc<AppState<S>>> {
    Router::new()
        // User administration endpoints
        .route("/api/user/list", post(user::list_users))
        .route("/api/user/create", post(user::create_user))
        .route("/api/user/update", post(user::update_user))
        .route("/api/user/delete", post(user::delete_user))
        // Credential endpoints
        .route("/api/signup-code/generate", post(signup_code::generate_signup_code))
        .route("/api/api-token/generate", post(api_token::generate_api_token))
        .route("/api/api-token/list", post(api_token::list_api_tokens))
        .route("/api/api-token/revoke", post(api_token::revoke_api_token))
        // Audit endpoints
        .route("/api/activity/list", post(activity::list_activities))
        .route_layer(from_fn_with_state(
            RoleGate::at_least(Role::Admin),
            require_role,
        ))
}

/// Health check endpoint.
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
