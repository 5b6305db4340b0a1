//! Credentials and sessions for the inventory back office.
//!
//! This crate provides:
//! - argon2 password hashing and verification
//! - JWT session tokens carrying the user ID and authentication stage
//! - RFC 6238 time-based one-time codes for the second factor
//! - Random secrets for signup codes and API tokens

mod error;
mod jwt;
mod password;
mod secret;
mod totp;

pub use error::*;
pub use jwt::*;
pub use password::*;
pub use secret::*;
pub use totp::*;

/// Default JWT expiration time in hours.
pub const DEFAULT_JWT_EXPIRATION_HOURS: u64 = 24;

/// Default JWT issuer.
pub const DEFAULT_JWT_ISSUER: &str = "inventory";

/// Lifetime of a token that still awaits its second factor, in minutes.
pub const PENDING_SECOND_FACTOR_MINUTES: i64 = 5;
