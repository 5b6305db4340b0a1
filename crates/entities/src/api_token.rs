//! API token entity definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A bearer credential for machine clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiToken {
    /// Unique identifier.
    pub id: Uuid,
    /// Human-readable label.
    pub name: String,
    /// Secret bearer value.
    pub token: String,
    /// User the token acts on behalf of.
    pub user_id: Uuid,
    /// When this record was created.
    pub created_at: DateTime<Utc>,
    /// Optional expiry.
    pub expires_at: Option<DateTime<Utc>>,
    /// Last time the token authenticated a request.
    pub last_used_at: Option<DateTime<Utc>>,
}

impl ApiToken {
    /// Creates a non-expiring token.
    pub fn new(name: impl Into<String>, token: impl Into<String>, user_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            token: token.into(),
            user_id,
            created_at: Utc::now(),
            expires_at: None,
            last_used_at: None,
        }
    }

    /// Sets the expiry.
    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Returns true if the token has expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at < now)
    }
}
