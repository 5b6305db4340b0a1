//! User-related entity definitions.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Permission level of a user, ordered from least to most privileged.
///
/// The derived ordering is the role hierarchy: a role satisfies every
/// requirement at or below its own level.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Role {
    /// Read-only access to the catalog.
    #[default]
    User,
    /// May change products, categories and stock.
    Editor,
    /// May manage users, signup codes, API tokens and read the audit log.
    Admin,
}

impl Role {
    /// Every role, lowest first.
    pub const ALL: [Role; 3] = [Role::User, Role::Editor, Role::Admin];

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Editor => "Editor",
            Role::Admin => "Admin",
        }
    }

    /// Position of this role in the hierarchy.
    pub fn rank(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| format!("invalid role: {s}"))
    }
}

/// Account status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    /// May sign in.
    #[default]
    Active,
    /// Sign-in refused.
    Disabled,
}

impl UserStatus {
    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Disabled => "disabled",
        }
    }
}

impl FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(UserStatus::Active),
            "disabled" => Ok(UserStatus::Disabled),
            other => Err(format!("invalid user status: {other}")),
        }
    }
}

/// A back-office user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier.
    pub id: Uuid,
    /// Email address, stored lowercase.
    pub email: String,
    /// Salted password hash (PHC string).
    pub password_hash: String,
    /// Permission level.
    pub role: Role,
    /// Account status.
    pub status: UserStatus,
    /// Display name.
    pub name: Option<String>,
    /// Whether sign-in requires a one-time code.
    pub two_factor_enabled: bool,
    /// Base32 TOTP secret, present while the second factor is enabled.
    pub two_factor_secret: Option<String>,
    /// Last successful sign-in.
    pub last_login_at: Option<DateTime<Utc>>,
    /// When this record was created.
    pub created_at: DateTime<Utc>,
    /// When this record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Creates a new active user. The email is normalized to lowercase.
    pub fn new(email: impl AsRef<str>, password_hash: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: normalize_email(email.as_ref()),
            password_hash: password_hash.into(),
            role: Role::default(),
            status: UserStatus::default(),
            name: None,
            two_factor_enabled: false,
            two_factor_secret: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the role.
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns true if the account may sign in.
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

/// Normalizes an email address for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
