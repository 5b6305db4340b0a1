//! Time-based one-time codes (RFC 6238) for the second factor.
//!
//! Secrets are 20 random bytes, shared with authenticator apps as unpadded
//! base32. Codes are six digits over a 30 second step, HMAC-SHA1.

use data_encoding::BASE32_NOPAD;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha1::Sha1;
use subtle::ConstantTimeEq;
use url::Url;

use crate::{AuthError, AuthResult};

/// Length of one time step in seconds.
pub const TOTP_STEP_SECONDS: i64 = 30;

/// Number of digits in a code.
pub const TOTP_DIGITS: u32 = 6;

/// Steps of clock drift accepted in each direction.
pub const TOTP_SKEW_STEPS: i64 = 1;

const TOTP_SECRET_BYTES: usize = 20;

type HmacSha1 = Hmac<Sha1>;

/// Generates a new base32 secret.
pub fn generate_totp_secret() -> String {
    let mut bytes = [0u8; TOTP_SECRET_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    BASE32_NOPAD.encode(&bytes)
}

fn decode_secret(secret: &str) -> AuthResult<Vec<u8>> {
    let normalized: String = secret
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '=')
        .map(|c| c.to_ascii_uppercase())
        .collect();
    BASE32_NOPAD
        .decode(normalized.as_bytes())
        .map_err(|e| AuthError::InvalidSecret(e.to_string()))
}

fn hotp(key: &[u8], counter: u64) -> AuthResult<String> {
    let mut mac =
        HmacSha1::new_from_slice(key).map_err(|e| AuthError::InvalidSecret(e.to_string()))?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = u32::from_be_bytes([
        digest[offset] & 0x7f,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);
    let code = binary % 10u32.pow(TOTP_DIGITS);
    Ok(format!("{:0width$}", code, width = TOTP_DIGITS as usize))
}

/// Returns the code for `secret` at `unix_time`.
pub fn totp_code(secret: &str, unix_time: i64) -> AuthResult<String> {
    let key = decode_secret(secret)?;
    hotp(&key, (unix_time / TOTP_STEP_SECONDS) as u64)
}

/// Checks `code` against `secret` at `unix_time`, tolerating one step of
/// drift either way.
pub fn verify_totp(secret: &str, code: &str, unix_time: i64) -> AuthResult<bool> {
    let code = code.trim();
    if code.len() != TOTP_DIGITS as usize || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(false);
    }

    let key = decode_secret(secret)?;
    let step = unix_time / TOTP_STEP_SECONDS;
    let mut matched = false;
    for drift in -TOTP_SKEW_STEPS..=TOTP_SKEW_STEPS {
        let counter = step + drift;
        if counter < 0 {
            continue;
        }
        let expected = hotp(&key, counter as u64)?;
        matched |= bool::from(expected.as_bytes().ct_eq(code.as_bytes()));
    }
    Ok(matched)
}

/// Builds the `otpauth://` URL authenticator apps scan.
pub fn provisioning_url(issuer: &str, account: &str, secret: &str) -> AuthResult<String> {
    let mut url = Url::parse("otpauth://totp/")
        .map_err(|e| AuthError::Configuration(e.to_string()))?;
    url.set_path(&format!("{issuer}:{account}"));
    url.query_pairs_mut()
        .append_pair("secret", secret)
        .append_pair("issuer", issuer)
        .append_pair("algorithm", "SHA1")
        .append_pair("digits", &TOTP_DIGITS.to_string())
        .append_pair("period", &TOTP_STEP_SECONDS.to_string());
    Ok(url.to_string())
}
