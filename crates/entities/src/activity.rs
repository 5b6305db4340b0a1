//! Audit log entity definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One audited request. Entries are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Unique identifier.
    pub id: Uuid,
    /// Who made the request: an email, or the bearer value for token callers.
    pub actor: String,
    /// Method and path, e.g. `POST /api/product/create`.
    pub action: String,
    /// Redacted request body and query parameters.
    pub details: serde_json::Value,
    /// When the request completed.
    pub timestamp: DateTime<Utc>,
}

impl Activity {
    /// Creates a new activity entry stamped now.
    pub fn new(
        actor: impl Into<String>,
        action: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor: actor.into(),
            action: action.into(),
            details,
            timestamp: Utc::now(),
        }
    }
}
