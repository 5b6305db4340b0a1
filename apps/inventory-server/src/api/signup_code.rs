//! Signup code API endpoints.

use std::sync::Arc;

use api_protocol::{requests::*, responses::*};
use axum::{Json, extract::State};
use inventory_store::InventoryStore;

use crate::error::{ApiJson, ServerResult};
use crate::services::AuthSession;
use crate::state::AppState;

/// Generates a single-use signup code, optionally granting a role.
pub async fn generate_signup_code<S: InventoryStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(request): ApiJson<GenerateSignupCodeRequest>,
) -> ServerResult<Json<SignupCodeResponse>> {
    let code = AuthSession::new(&state)
        .issue_signup_code(request.role)
        .await?;

    Ok(Json(SignupCodeResponse {
        role: code.granted_role(),
        code: code.code,
        expires_at: code.expires_at,
    }))
}
