//! Signup code entity definitions.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Role;

/// A single-use registration code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignupCode {
    /// Unique identifier.
    pub id: Uuid,
    /// Random code handed to the invitee.
    pub code: String,
    /// Role granted on registration; `None` grants the lowest role.
    pub role: Option<Role>,
    /// When this record was created.
    pub created_at: DateTime<Utc>,
    /// When the code stops being accepted.
    pub expires_at: DateTime<Utc>,
}

impl SignupCode {
    /// Creates a code valid for `ttl` from now.
    pub fn new(code: impl Into<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            code: code.into(),
            role: None,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    /// Sets the role granted by this code.
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    /// Returns true once the code has expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Role granted on registration.
    pub fn granted_role(&self) -> Role {
        self.role.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signup_code_expiry() {
        let code = SignupCode::new("abc", Duration::hours(24));
        assert!(!code.is_expired_at(Utc::now()));
        assert!(code.is_expired_at(Utc::now() + Duration::hours(25)));
    }

    #[test]
    fn test_granted_role_defaults_to_lowest() {
        let code = SignupCode::new("abc", Duration::hours(1));
        assert_eq!(code.granted_role(), Role::User);
        assert_eq!(code.with_role(Role::Editor).granted_role(), Role::Editor);
    }
}
