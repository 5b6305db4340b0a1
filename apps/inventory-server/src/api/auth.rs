//! Authentication API endpoints.

use std::sync::Arc;

use api_protocol::{requests::*, responses::*, CredentialKind, UserInfo};
use axum::{Json, extract::State};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use inventory_store::InventoryStore;

use crate::error::{ApiJson, ServerResult};
use crate::middleware::{PendingSecondFactor, Principal, SESSION_COOKIE};
use crate::services::AuthSession;
use crate::state::AppState;

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Signs in with email and password.
///
/// Users with a second factor get a pending token; the session cookie is set
/// either way so browser clients can continue to the verification step.
pub async fn login<S: InventoryStore>(
    State(state): State<Arc<AppState<S>>>,
    jar: CookieJar,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ServerResult<(CookieJar, Json<SessionResponse>)> {
    let session = AuthSession::new(&state)
        .login(&request.email, &request.password)
        .await?;

    let jar = jar.add(session_cookie(session.token.clone()));
    Ok((jar, Json(session)))
}

/// Registers a new account with a signup code.
pub async fn register<S: InventoryStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> ServerResult<Json<RegisterResponse>> {
    let user = AuthSession::new(&state).register(request).await?;

    Ok(Json(RegisterResponse {
        user: UserInfo::from(&user),
    }))
}

/// Trades a pending token and a one-time code for a full session.
pub async fn verify_second_factor<S: InventoryStore>(
    State(state): State<Arc<AppState<S>>>,
    pending: PendingSecondFactor,
    jar: CookieJar,
    ApiJson(request): ApiJson<VerifySecondFactorRequest>,
) -> ServerResult<(CookieJar, Json<SessionResponse>)> {
    let session = AuthSession::new(&state)
        .verify_second_factor(pending.user, &request.code)
        .await?;

    let jar = jar.add(session_cookie(session.token.clone()));
    Ok((jar, Json(session)))
}

/// Returns the current principal.
pub async fn me(principal: Principal) -> Json<MeResponse> {
    Json(MeResponse {
        user: UserInfo::from(&principal.user),
        credential: principal.credential,
    })
}

/// Ends a browser session by clearing the session cookie.
///
/// Session tokens are stateless, so a bearer client simply discards its
/// token.
pub async fn logout(
    principal: Principal,
    jar: CookieJar,
    ApiJson(_request): ApiJson<LogoutRequest>,
) -> (CookieJar, Json<LogoutResponse>) {
    if principal.credential == CredentialKind::Session {
        tracing::info!(user_id = %principal.user.id, "Signed out");
    }
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Json(LogoutResponse {}))
}
