//! Input validation shared by the services.

use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use entities::normalize_email;
use inventory_store::StoreError;

use crate::error::{ServerError, ServerResult};

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Largest quantity a single movement or opening stock may carry.
pub const MAX_QUANTITY: i64 = 1_000_000_000;

/// Longest lifetime an API token may be issued with.
pub const MAX_TOKEN_LIFETIME_DAYS: u32 = 3650;

static EMAIL_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("regex pattern is valid")
});

/// Normalizes `email` and checks its shape.
pub fn validate_email(email: &str) -> ServerResult<String> {
    let email = normalize_email(email);
    if !EMAIL_RE.is_match(&email) {
        return Err(ServerError::InvalidRequest(format!(
            "Invalid email address: {email}"
        )));
    }
    Ok(email)
}

/// Checks password length and, when given, that the confirmation matches.
pub fn validate_password(password: &str, confirmation: Option<&str>) -> ServerResult<()> {
    if confirmation.is_some_and(|confirmation| confirmation != password) {
        return Err(ServerError::InvalidRequest(
            "Passwords do not match".to_string(),
        ));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ServerError::InvalidRequest(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Trims `name` and rejects it if nothing is left.
pub fn required_name(field: &str, name: &str) -> ServerResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServerError::InvalidRequest(format!("{field} must not be empty")));
    }
    Ok(name.to_string())
}

/// Trims optional text, mapping blank input to `None`.
pub fn optional_text(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

/// Parses an optional list parameter such as `sort_by` or `order`, using the
/// default when it is absent.
pub fn parse_or_default<T>(value: Option<&str>) -> ServerResult<T>
where
    T: FromStr<Err = String> + Default,
{
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => value.parse().map_err(ServerError::InvalidRequest),
        None => Ok(T::default()),
    }
}

/// Expiry instant for a token issued at `now` that lives `days` days.
pub fn token_expiry(now: DateTime<Utc>, days: u32) -> ServerResult<DateTime<Utc>> {
    if days > MAX_TOKEN_LIFETIME_DAYS {
        return Err(ServerError::InvalidRequest(format!(
            "Token lifetime must not exceed {MAX_TOKEN_LIFETIME_DAYS} days"
        )));
    }
    Duration::try_days(i64::from(days))
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| ServerError::InvalidRequest("Token expiry is out of range".to_string()))
}

/// Surfaces a unique-email violation as [`ServerError::DuplicateEmail`].
pub fn duplicate_email(email: &str) -> impl FnOnce(StoreError) -> ServerError + '_ {
    move |e| match e {
        StoreError::AlreadyExists { .. } => ServerError::DuplicateEmail(email.to_string()),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert_eq!(
            validate_email(" Ada@Example.COM ").unwrap(),
            "ada@example.com"
        );
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("a@b").is_err());
        assert!(validate_email("two@@example.com").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("secret1", Some("secret1")).is_ok());
        assert!(validate_password("secret1", None).is_ok());
        assert!(matches!(
            validate_password("secret1", Some("secret2")),
            Err(ServerError::InvalidRequest(msg)) if msg.contains("match")
        ));
        assert!(validate_password("short", None).is_err());
    }

    #[test]
    fn test_parse_or_default() {
        use inventory_store::{ProductSort, SortOrder};

        assert_eq!(parse_or_default::<ProductSort>(None).unwrap(), ProductSort::Name);
        assert_eq!(
            parse_or_default::<ProductSort>(Some("price")).unwrap(),
            ProductSort::Price
        );
        assert_eq!(parse_or_default::<SortOrder>(Some("DESC")).unwrap(), SortOrder::Desc);
        assert!(parse_or_default::<ProductSort>(Some("colour")).is_err());
    }

    #[test]
    fn test_names_and_text() {
        assert_eq!(required_name("Name", "  Bolts ").unwrap(), "Bolts");
        assert!(required_name("Name", "   ").is_err());
        assert_eq!(optional_text(Some("  ".to_string())), None);
        assert_eq!(optional_text(Some(" x ".to_string())), Some("x".to_string()));
    }

    #[test]
    fn test_token_expiry() {
        let now = Utc::now();
        assert_eq!(token_expiry(now, 30).unwrap(), now + Duration::days(30));
        assert!(token_expiry(now, MAX_TOKEN_LIFETIME_DAYS).is_ok());
        assert!(matches!(
            token_expiry(now, MAX_TOKEN_LIFETIME_DAYS + 1),
            Err(ServerError::InvalidRequest(_))
        ));
        assert!(token_expiry(now, u32::MAX).is_err());
        assert!(token_expiry(DateTime::<Utc>::MAX_UTC, 1).is_err());
    }
}
