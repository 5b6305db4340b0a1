//! User administration API endpoints.

use std::sync::Arc;

use api_protocol::{requests::*, responses::*, UserInfo};
use axum::{Json, extract::State};
use inventory_store::InventoryStore;

use crate::error::{ApiJson, ServerResult};
use crate::middleware::Principal;
use crate::services::UserAdmin;
use crate::state::AppState;

/// Lists all users.
pub async fn list_users<S: InventoryStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(_request): ApiJson<ListUsersRequest>,
) -> ServerResult<Json<ListUsersResponse>> {
    let users = state.store.list_users().await?;

    Ok(Json(ListUsersResponse {
        users: users.iter().map(UserInfo::from).collect(),
    }))
}

/// Creates a user.
pub async fn create_user<S: InventoryStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(request): ApiJson<CreateUserRequest>,
) -> ServerResult<Json<UserResponse>> {
    let user = UserAdmin::new(&state.store)
        .create(
            &request.email,
            &request.password,
            request.role.unwrap_or_default(),
            request.name,
        )
        .await?;

    Ok(Json(UserResponse {
        user: UserInfo::from(&user),
    }))
}

/// Updates a user.
pub async fn update_user<S: InventoryStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(request): ApiJson<UpdateUserRequest>,
) -> ServerResult<Json<UserResponse>> {
    let user = UserAdmin::new(&state.store).update(request).await?;

    Ok(Json(UserResponse {
        user: UserInfo::from(&user),
    }))
}

/// Deletes a user other than the caller.
pub async fn delete_user<S: InventoryStore>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    ApiJson(request): ApiJson<DeleteUserRequest>,
) -> ServerResult<Json<DeletedResponse>> {
    UserAdmin::new(&state.store)
        .delete(&principal.user, request.user_id)
        .await?;

    Ok(Json(DeletedResponse { deleted: true }))
}
