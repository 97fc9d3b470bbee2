//! Signing schemes for the two payment-gateway wire formats.
//!
//! Both gateways mandate SHA-1 digests for compatibility with their legacy
//! merchant APIs. That digest is collision-prone and is documented as a known
//! weakness; it is isolated behind this module so it can be swapped without
//! touching the adapter or the handlers. Comparisons are constant-time.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;

/// Gateway A scheme: `base64(sha1(secret || payload || secret))` over the
/// base64-encoded payload envelope.
pub fn sign_enveloped(secret: &str, payload_b64: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(secret.as_bytes());
    hasher.update(payload_b64.as_bytes());
    hasher.update(secret.as_bytes());
    BASE64.encode(hasher.finalize())
}

pub fn verify_enveloped(secret: &str, payload_b64: &str, signature: &str) -> bool {
    constant_time_eq(&sign_enveloped(secret, payload_b64), signature)
}

/// Gateway B scheme: sort fields lexicographically by key, join as
/// `key|value` pairs with `|`, prepend `secret|`, then hex-encode the SHA-1
/// digest. The `signature` field itself never participates.
pub fn sign_fields(secret: &str, fields: &BTreeMap<String, String>) -> String {
    let joined = fields
        .iter()
        .filter(|(key, _)| key.as_str() != "signature")
        .map(|(key, value)| format!("{}|{}", key, value))
        .collect::<Vec<_>>()
        .join("|");

    let mut hasher = Sha1::new();
    hasher.update(secret.as_bytes());
    hasher.update(b"|");
    hasher.update(joined.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn verify_fields(secret: &str, fields: &BTreeMap<String, String>, signature: &str) -> bool {
    constant_time_eq(&sign_fields(secret, fields), signature)
}

/// Compares without short-circuiting on the first differing byte, so the
/// comparison itself leaks no timing information about the expected value.
pub(crate) fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        diff |= x ^ y;
    }
    diff == 0
}
