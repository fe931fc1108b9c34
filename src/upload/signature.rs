//! Request signing for the Cloudinary upload API
//!
//! Signed parameters are sorted by name, joined as `k=v&k=v`, the API
//! secret is appended, and the result is hashed with SHA-256.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Algorithm name sent alongside the signature
pub const SIGNATURE_ALGORITHM: &str = "sha256";

/// Build the canonical string that gets hashed (without the secret)
pub fn string_to_sign(params: &BTreeMap<&str, String>) -> String {
    params
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&")
}

/// Sign request parameters with the API secret
pub fn sign(params: &BTreeMap<&str, String>, api_secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(string_to_sign(params).as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}
