//! Keyed one-way digests used for server-side equality lookups.

use crate::key::random_32;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 of `input` keyed by `salt`, lower hex.
///
/// Deterministic for a given (input, salt) pair so the backend can detect
/// duplicate secret keys without seeing them.
pub fn digest(input: &str, salt: &str) -> String {
    // HMAC pads or hashes the key, so no length is rejected.
    let mut mac =
        HmacSha256::new_from_slice(salt.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(input.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Fresh 32-byte digest salt, lower hex. Stored wrapped alongside a scope seed.
pub fn new_salt() -> String {
    hex::encode(random_32())
}

/// SHA-256 of a raw bearer token, lower hex. The backend indexes tokens by
/// this value and never stores the raw token.
pub fn token_lookup_digest(raw_token: &str) -> String {
    hex::encode(Sha256::digest(raw_token.as_bytes()))
}
