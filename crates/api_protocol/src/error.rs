//! API error payloads.

use serde::{Deserialize, Serialize};

/// Machine-readable error codes carried in [`ErrorDetail::code`].
pub mod error_codes {
    /// Malformed or invalid input.
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    /// The referenced entity does not exist.
    pub const RESOURCE_NOT_FOUND: &str = "RESOURCE_NOT_FOUND";
    /// No principal could be resolved for the request.
    pub const AUTHENTICATION_REQUIRED: &str = "AUTHENTICATION_REQUIRED";
    /// Email or password did not match.
    pub const INVALID_CREDENTIALS: &str = "INVALID_CREDENTIALS";
    /// The session still awaits its one-time code.
    pub const SECOND_FACTOR_REQUIRED: &str = "SECOND_FACTOR_REQUIRED";
    /// The principal's role is below the route's requirement.
    pub const PERMISSION_DENIED: &str = "PERMISSION_DENIED";
    /// An outgoing movement exceeds the stock on hand.
    pub const INSUFFICIENT_STOCK: &str = "INSUFFICIENT_STOCK";
    /// The operation would leave stock negative or is otherwise not allowed.
    pub const INVALID_OPERATION: &str = "INVALID_OPERATION";
    /// Blocked by existing references or a uniqueness rule.
    pub const CONFLICT: &str = "CONFLICT";
    /// The email address is already registered.
    pub const DUPLICATE_EMAIL: &str = "DUPLICATE_EMAIL";
    /// The signup code is unknown, expired or already used.
    pub const INVALID_CODE: &str = "INVALID_CODE";
    /// Unexpected server failure.
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Error body returned by every failing JSON endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.to_string(),
                message: message.into(),
            },
        }
    }
}
