//! Profile API endpoints: the caller's own account.

use std::sync::Arc;

use api_protocol::{requests::*, responses::*, UserInfo};
use axum::{Json, extract::State};
use inventory_store::InventoryStore;

use crate::error::{ApiJson, ServerError, ServerResult};
use crate::middleware::Principal;
use crate::services::{AuthSession, UserAdmin};
use crate::state::AppState;

/// Re-reads the caller so changes build on the stored record.
async fn current_user<S: InventoryStore>(
    state: &AppState<S>,
    principal: &Principal,
) -> ServerResult<entities::User> {
    state
        .store
        .get_user(principal.user.id)
        .await?
        .ok_or(ServerError::AuthenticationRequired)
}

/// Gets the caller's profile.
pub async fn get_profile(
    principal: Principal,
    ApiJson(_request): ApiJson<GetProfileRequest>,
) -> Json<ProfileResponse> {
    Json(ProfileResponse {
        user: UserInfo::from(&principal.user),
    })
}

/// Updates the caller's email, name or password.
pub async fn update_profile<S: InventoryStore>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    ApiJson(request): ApiJson<UpdateProfileRequest>,
) -> ServerResult<Json<ProfileResponse>> {
    let user = current_user(&state, &principal).await?;
    let user = UserAdmin::new(&state.store)
        .update_profile(&user, request)
        .await?;

    Ok(Json(ProfileResponse {
        user: UserInfo::from(&user),
    }))
}

/// Starts second-factor enrolment and returns the new secret.
pub async fn enable_second_factor<S: InventoryStore>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    ApiJson(_request): ApiJson<EnableSecondFactorRequest>,
) -> ServerResult<Json<EnableSecondFactorResponse>> {
    let user = current_user(&state, &principal).await?;
    let enrolment = AuthSession::new(&state).begin_second_factor(user).await?;

    Ok(Json(enrolment))
}

/// Confirms enrolment with a first one-time code.
pub async fn confirm_second_factor<S: InventoryStore>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    ApiJson(request): ApiJson<ConfirmSecondFactorRequest>,
) -> ServerResult<Json<ProfileResponse>> {
    let user = current_user(&state, &principal).await?;
    let user = AuthSession::new(&state)
        .confirm_second_factor(user, &request.code)
        .await?;

    Ok(Json(ProfileResponse {
        user: UserInfo::from(&user),
    }))
}

/// Turns the second factor off.
pub async fn disable_second_factor<S: InventoryStore>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    ApiJson(request): ApiJson<DisableSecondFactorRequest>,
) -> ServerResult<Json<ProfileResponse>> {
    let user = current_user(&state, &principal).await?;
    let user = AuthSession::new(&state)
        .disable_second_factor(user, &request.code)
        .await?;

    Ok(Json(ProfileResponse {
        user: UserInfo::from(&user),
    }))
}
