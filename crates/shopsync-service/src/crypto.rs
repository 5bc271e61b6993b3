//! Webhook signature verification primitives.
//!
//! The source platform signs each webhook body with HMAC-SHA256 over the
//! shared secret; the edge recomputes the digest and compares in constant
//! time before acknowledging.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute HMAC-SHA256 of a webhook body and return it hex-encoded.
///
/// # Panics
///
/// Never panics in practice. The `expect` is guarded by the invariant that
/// HMAC-SHA256 accepts keys of any size per RFC 2104.
#[must_use]
pub fn hmac_sha256_hex(secret: &str, message: &str) -> String {
    // INVARIANT: HMAC-SHA256 accepts keys of any size per RFC 2104, so
    // `new_from_slice` only fails if the Hmac implementation is broken.
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC-SHA256 accepts any key size");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a hex-encoded webhook signature against the body.
#[must_use]
pub fn verify_signature(secret: &str, body: &str, signature: &str) -> bool {
    let expected = hmac_sha256_hex(secret, body);
    constant_time_eq(&expected, signature)
}

/// Constant-time string comparison to prevent timing attacks on signature
/// checks.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
