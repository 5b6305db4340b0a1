//! API token endpoints.

use std::sync::Arc;

use api_protocol::{requests::*, responses::*, ApiTokenInfo};
use axum::{Json, extract::State};
use chrono::Utc;
use entities::ApiToken;
use inventory_store::InventoryStore;

use crate::error::{ApiJson, ServerResult};
use crate::middleware::Principal;
use crate::services::validation::{required_name, token_expiry};
use crate::state::AppState;

/// Generates an API token owned by the caller. The secret is only returned
/// here.
pub async fn generate_api_token<S: InventoryStore>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    ApiJson(request): ApiJson<GenerateApiTokenRequest>,
) -> ServerResult<Json<GenerateApiTokenResponse>> {
    let name = required_name("Token name", &request.name)?;
    let mut token = ApiToken::new(name, auth::generate_api_token(), principal.user.id);
    if let Some(days) = request.expires_in_days {
        token = token.with_expires_at(token_expiry(Utc::now(), days)?);
    }

    let token = state.store.create_api_token(token).await?;
    tracing::info!(token_id = %token.id, user_id = %token.user_id, "API token generated");

    Ok(Json(GenerateApiTokenResponse {
        api_token: ApiTokenInfo::from(&token),
        token: token.token,
    }))
}

/// Lists API tokens without their secrets.
pub async fn list_api_tokens<S: InventoryStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(_request): ApiJson<ListApiTokensRequest>,
) -> ServerResult<Json<ListApiTokensResponse>> {
    let tokens = state.store.list_api_tokens().await?;

    Ok(Json(ListApiTokensResponse {
        api_tokens: tokens.iter().map(ApiTokenInfo::from).collect(),
    }))
}

/// Revokes an API token.
pub async fn revoke_api_token<S: InventoryStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(request): ApiJson<RevokeApiTokenRequest>,
) -> ServerResult<Json<DeletedResponse>> {
    state.store.delete_api_token(request.token_id).await?;
    tracing::info!(token_id = %request.token_id, "API token revoked");

    Ok(Json(DeletedResponse { deleted: true }))
}
