//! Principal resolution.
//!
//! Every request passes through [`resolve_principal`], which looks for a
//! session JWT (bearer header or session cookie) and falls back to treating
//! the bearer value as an API token. The outcome is stored in the request
//! extensions, where handlers pick it up through the [`Principal`] and
//! [`PendingSecondFactor`] extractors.

use api_protocol::CredentialKind;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use chrono::Utc;
use entities::User;
use inventory_store::InventoryStore;

use crate::error::{ServerError, ServerResult};
use crate::state::{AppState, SharedState};

/// Name of the cookie carrying the session JWT.
pub const SESSION_COOKIE: &str = "inventory_session";

/// A fully authenticated caller.
#[derive(Debug, Clone)]
pub struct Principal {
    /// The user as currently stored.
    pub user: User,
    /// How the caller authenticated.
    pub credential: CredentialKind,
}

/// A caller who passed the password check and still owes a one-time code.
#[derive(Debug, Clone)]
pub struct PendingSecondFactor {
    pub user: User,
}

/// The raw bearer value sent with the request, kept for the activity log.
#[derive(Debug, Clone)]
pub struct BearerCredential(pub String);

/// Outcome of resolving the caller's credentials.
#[derive(Debug, Clone)]
pub enum Resolution {
    Anonymous,
    Pending(PendingSecondFactor),
    Authenticated(Principal),
}

/// Extracts the bearer value from the Authorization header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Resolves the caller from request headers.
///
/// Session JWTs win over API tokens. Unknown or disabled users resolve to
/// [`Resolution::Anonymous`].
pub async fn resolve<S: InventoryStore>(
    state: &AppState<S>,
    headers: &HeaderMap,
) -> ServerResult<Resolution> {
    let bearer = bearer_token(headers);
    let jar = CookieJar::from_headers(headers);
    let cookie = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());

    for token in bearer.into_iter().chain(cookie.as_deref()) {
        let Ok(claims) = state.jwt_manager.validate_token(token) else {
            continue;
        };
        let Some(user) = state.store.get_user(claims.user_id()?).await? else {
            return Ok(Resolution::Anonymous);
        };
        if !user.is_active() {
            tracing::debug!(user_id = %user.id, "Session for disabled user ignored");
            return Ok(Resolution::Anonymous);
        }
        if !claims.is_complete() {
            return Ok(Resolution::Pending(PendingSecondFactor { user }));
        }
        return Ok(Resolution::Authenticated(Principal {
            user,
            credential: CredentialKind::Session,
        }));
    }

    if let Some(token) = bearer {
        if let Some(api_token) = state.store.authenticate_api_token(token, Utc::now()).await? {
            match state.store.get_user(api_token.user_id).await? {
                Some(user) if user.is_active() => {
                    tracing::debug!(token_id = %api_token.id, user_id = %user.id, "API token accepted");
                    return Ok(Resolution::Authenticated(Principal {
                        user,
                        credential: CredentialKind::ApiToken,
                    }));
                }
                _ => {
                    tracing::debug!(token_id = %api_token.id, "API token owner missing or disabled");
                }
            }
        }
    }

    Ok(Resolution::Anonymous)
}

/// Middleware that attaches the resolved caller to the request.
pub async fn resolve_principal<S: InventoryStore + 'static>(
    State(state): State<SharedState<S>>,
    mut request: Request,
    next: Next,
) -> Response {
    let resolution = match resolve(&state, request.headers()).await {
        Ok(resolution) => resolution,
        Err(e) => return e.into_response(),
    };

    if let Some(token) = bearer_token(request.headers()) {
        let credential = BearerCredential(token.to_string());
        request.extensions_mut().insert(credential);
    }

    match resolution {
        Resolution::Authenticated(principal) => {
            request.extensions_mut().insert(principal);
        }
        Resolution::Pending(pending) => {
            request.extensions_mut().insert(pending);
        }
        Resolution::Anonymous => {}
    }

    next.run(request).await
}

impl<S: Send + Sync> FromRequestParts<S> for Principal {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(principal) = parts.extensions.get::<Principal>() {
            return Ok(principal.clone());
        }
        if parts.extensions.get::<PendingSecondFactor>().is_some() {
            return Err(ServerError::SecondFactorRequired);
        }
        Err(ServerError::AuthenticationRequired)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for PendingSecondFactor {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(pending) = parts.extensions.get::<PendingSecondFactor>() {
            return Ok(pending.clone());
        }
        if parts.extensions.get::<Principal>().is_some() {
            return Err(ServerError::InvalidRequest(
                "No second-factor challenge is pending".to_string(),
            ));
        }
        Err(ServerError::AuthenticationRequired)
    }
}
