//! Bearer credentials and password hashing.
//!
//! Account and runner tokens are opaque random strings shown exactly once at
//! issue time. Only the SHA-256 digest is stored; presented tokens are hashed
//! and compared in constant time so a lookup can never confirm a near-miss.

use rand::distributions::Alphanumeric;
use rand::{Rng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Length of generated bearer tokens.
pub const TOKEN_LEN: usize = 80;

const SALT_LEN: usize = 16;

/// Generate a new opaque bearer token: 80 alphanumeric characters.
pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Hash a token for storage. Hex-encoded SHA-256.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Compare a presented token against a stored hash without leaking a timing
/// side channel.
pub fn verify_token(presented: &str, stored_hash: &str) -> bool {
    let Ok(stored) = hex::decode(stored_hash) else {
        return false;
    };
    let digest = Sha256::digest(presented.as_bytes());
    digest.as_slice().ct_eq(&stored).into()
}

/// Hash a password with a fresh random salt. Stored as `{salt}${digest}`,
/// both hex-encoded.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);

    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    format!("{}${}", hex::encode(salt), hex::encode(hasher.finalize()))
}

/// Verify a password against a stored `{salt}${digest}` value.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_hex, digest_hex)) = stored.split_once('$') else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(digest_hex)) else {
        return false;
    };

    let mut hasher = Sha256::new();
    hasher.update(&salt);
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();
    digest.as_slice().ct_eq(&expected).into()
}
