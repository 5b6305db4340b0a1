//! Server error types.

use api_protocol::{ErrorBody, error_codes};
use auth::AuthError;
use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use inventory_store::{StoreError, ViolationKind};
use serde::de::DeserializeOwned;

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Malformed or invalid request input.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// No principal on the request.
    #[error("Authentication required")]
    AuthenticationRequired,

    /// Wrong email/password or second-factor code.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Password accepted, second factor still outstanding.
    #[error("Second factor required")]
    SecondFactorRequired,

    /// Role too low for the operation.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// An outgoing movement exceeds the stock on hand.
    #[error("{0}")]
    InsufficientStock(String),

    /// The operation cannot be applied in the current state.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Blocked by existing references or a uniqueness rule.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The email address already belongs to a user.
    #[error("Email already registered: {0}")]
    DuplicateEmail(String),

    /// Signup code absent, expired or already used.
    #[error("Invalid signup code")]
    InvalidCode,

    /// Database error.
    #[error("Database error: {0}")]
    Database(StoreError),

    /// Authentication error.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Returns the HTTP status and protocol error code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ServerError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, error_codes::INVALID_REQUEST),
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, error_codes::RESOURCE_NOT_FOUND),
            ServerError::AuthenticationRequired => {
                (StatusCode::UNAUTHORIZED, error_codes::AUTHENTICATION_REQUIRED)
            }
            ServerError::InvalidCredentials(_) => {
                (StatusCode::UNAUTHORIZED, error_codes::INVALID_CREDENTIALS)
            }
            ServerError::SecondFactorRequired => {
                (StatusCode::UNAUTHORIZED, error_codes::SECOND_FACTOR_REQUIRED)
            }
            ServerError::PermissionDenied(_) => (StatusCode::FORBIDDEN, error_codes::PERMISSION_DENIED),
            ServerError::InsufficientStock(_) => (StatusCode::CONFLICT, error_codes::INSUFFICIENT_STOCK),
            ServerError::InvalidOperation(_) => (StatusCode::CONFLICT, error_codes::INVALID_OPERATION),
            ServerError::Conflict(_) => (StatusCode::CONFLICT, error_codes::CONFLICT),
            ServerError::DuplicateEmail(_) => (StatusCode::CONFLICT, error_codes::DUPLICATE_EMAIL),
            ServerError::InvalidCode => (StatusCode::BAD_REQUEST, error_codes::INVALID_CODE),
            ServerError::Auth(
                AuthError::TokenExpired | AuthError::InvalidToken | AuthError::JwtValidation(_),
            ) => (StatusCode::UNAUTHORIZED, error_codes::AUTHENTICATION_REQUIRED),
            ServerError::Database(_) | ServerError::Auth(_) | ServerError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, error_codes::INTERNAL_ERROR)
            }
        }
    }

    /// Returns the message shown to clients.
    pub fn public_message(&self) -> String {
        match self {
            ServerError::InvalidRequest(msg)
            | ServerError::NotFound(msg)
            | ServerError::InvalidCredentials(msg)
            | ServerError::PermissionDenied(msg)
            | ServerError::InsufficientStock(msg)
            | ServerError::InvalidOperation(msg)
            | ServerError::Conflict(msg) => msg.clone(),
            ServerError::DuplicateEmail(email) => {
                format!("A user with email {email} already exists")
            }
            ServerError::AuthenticationRequired => "Authentication required".to_string(),
            ServerError::SecondFactorRequired => {
                "Second-factor verification required".to_string()
            }
            ServerError::InvalidCode => "Signup code is invalid or has expired".to_string(),
            ServerError::Auth(
                AuthError::TokenExpired | AuthError::InvalidToken | AuthError::JwtValidation(_),
            ) => "Invalid or expired token".to_string(),
            ServerError::Database(_) | ServerError::Auth(_) | ServerError::Internal(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity_type, id } => {
                ServerError::NotFound(format!("{entity_type} not found: {id}"))
            }
            StoreError::AlreadyExists { entity_type, id } => {
                ServerError::Conflict(format!("{entity_type} already exists: {id}"))
            }
            StoreError::Conflict(msg) => ServerError::Conflict(msg),
            StoreError::Stock(violation) => match violation.kind {
                ViolationKind::InsufficientStock => {
                    ServerError::InsufficientStock(violation.to_string())
                }
                ViolationKind::InvalidReversal => {
                    ServerError::InvalidOperation(violation.to_string())
                }
                ViolationKind::CapacityExceeded => {
                    ServerError::InvalidRequest(violation.to_string())
                }
            },
            other => ServerError::Database(other),
        }
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Request failed");
        }

        (status, Json(ErrorBody::new(code, self.public_message()))).into_response()
    }
}

/// JSON body extractor that rejects malformed input with a [`ServerError`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// Result type alias for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
