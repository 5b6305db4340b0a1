//! Random secrets.

use rand::RngCore;

/// Random bytes in a signup code.
pub const SIGNUP_CODE_BYTES: usize = 8;

/// Random bytes in an API token.
pub const API_TOKEN_BYTES: usize = 30;

/// Returns `len` random bytes, hex encoded.
pub fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Generates a signup code.
pub fn generate_signup_code() -> String {
    random_hex(SIGNUP_CODE_BYTES)
}

/// Generates an API token secret.
pub fn generate_api_token() -> String {
    random_hex(API_TOKEN_BYTES)
}
