//! Server configuration.

use std::env;
use std::str::FromStr;

/// Default byte cap for request bodies captured into the activity log.
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Database URL. `None` selects the in-memory store.
    pub database_url: Option<String>,
    /// Development mode: tolerates a missing JWT secret.
    pub dev_mode: bool,
    /// JWT signing secret.
    pub jwt_secret: String,
    /// Set when `jwt_secret` was generated because none was configured.
    pub jwt_secret_generated: bool,
    /// JWT expiration in hours.
    pub jwt_expiration_hours: u64,
    /// Lifetime of signup codes in hours.
    pub signup_code_ttl_hours: i64,
    /// Issuer shown by authenticator apps.
    pub totp_issuer: String,
    /// Email of the admin seeded into an empty user store.
    pub bootstrap_admin_email: Option<String>,
    /// Password of the seeded admin.
    pub bootstrap_admin_password: Option<String>,
    /// Log level.
    pub log_level: String,
    /// Largest request body the activity recorder will capture.
    pub max_body_bytes: usize,
}

impl Config {
    /// Creates a configuration with defaults and the given JWT secret.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            database_url: None,
            dev_mode: false,
            jwt_secret: jwt_secret.into(),
            jwt_secret_generated: false,
            jwt_expiration_hours: auth::DEFAULT_JWT_EXPIRATION_HOURS,
            signup_code_ttl_hours: 24,
            totp_issuer: "Inventory".to_string(),
            bootstrap_admin_email: None,
            bootstrap_admin_password: None,
            log_level: "info".to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let dev_mode = env::var("INVENTORY_DEV_MODE")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(false);

        let (jwt_secret, jwt_secret_generated) = match env::var("INVENTORY_JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => (secret, false),
            _ if dev_mode => (auth::random_hex(32), true),
            _ => anyhow::bail!("INVENTORY_JWT_SECRET is required unless INVENTORY_DEV_MODE=true"),
        };

        let defaults = Self::new(jwt_secret);

        Ok(Self {
            host: env::var("INVENTORY_SERVER_HOST").unwrap_or(defaults.host),
            port: env_or("INVENTORY_SERVER_PORT", defaults.port),
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            dev_mode,
            jwt_secret: defaults.jwt_secret,
            jwt_secret_generated,
            jwt_expiration_hours: env_or(
                "INVENTORY_JWT_EXPIRATION_HOURS",
                defaults.jwt_expiration_hours,
            ),
            signup_code_ttl_hours: env_or(
                "INVENTORY_SIGNUP_CODE_TTL_HOURS",
                defaults.signup_code_ttl_hours,
            ),
            totp_issuer: env::var("INVENTORY_TOTP_ISSUER").unwrap_or(defaults.totp_issuer),
            bootstrap_admin_email: env::var("INVENTORY_BOOTSTRAP_ADMIN_EMAIL").ok(),
            bootstrap_admin_password: env::var("INVENTORY_BOOTSTRAP_ADMIN_PASSWORD").ok(),
            log_level: env::var("INVENTORY_LOG_LEVEL").unwrap_or(defaults.log_level),
            max_body_bytes: env_or("INVENTORY_MAX_BODY_BYTES", defaults.max_body_bytes),
        })
    }

    /// Returns the server address.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the seed admin credentials if both are configured.
    pub fn bootstrap_admin(&self) -> Option<(&str, &str)> {
        match (&self.bootstrap_admin_email, &self.bootstrap_admin_password) {
            (Some(email), Some(password)) => Some((email, password)),
            _ => None,
        }
    }
}

/// Reads and parses `key`, falling back to `default` when unset or invalid.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
