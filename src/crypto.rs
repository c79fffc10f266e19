//! Hashing and signature checks.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Hash a secret (admin API key) for storage and comparison.
/// SHA-256 with an application salt, lowercase hex.
pub fn hash_secret(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"zoneticket-v1:");
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Lowercase hex HMAC-SHA256 of `payload`.
pub fn hmac_sha256_hex(secret: &[u8], payload: &[u8]) -> Option<String> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret).ok()?;
    mac.update(payload);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Check a hex HMAC-SHA256 signature over the raw request body.
///
/// An empty secret rejects everything: an unconfigured deployment must not
/// accept unsigned completion signals.
pub fn verify_hmac_sha256_hex(secret: &[u8], payload: &[u8], signature: &str) -> bool {
    if secret.is_empty() {
        return false;
    }
    let Some(expected) = hmac_sha256_hex(secret, payload) else {
        return false;
    };
    let provided = signature.trim().to_ascii_lowercase();

    // Signature length is not secret (always 64 hex chars)
    if expected.len() != provided.len() {
        return false;
    }
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

/// Constant-time comparison of two hex digests.
pub fn digest_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}
