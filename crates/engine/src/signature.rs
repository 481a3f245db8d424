//! HMAC signature generation and verification.
//!
//! The same codec signs outbound deliveries and verifies inbound calls;
//! only the key direction differs.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Prefix carried by every signature header value.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Computes the signature header value for a payload: `sha256=<hex(hmac)>`.
pub fn sign(secret: &str, payload: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(payload);
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(mac.finalize().into_bytes()))
}

/// Verifies a presented signature header against the payload.
///
/// Recomputes the expected value and compares in constant time.
pub fn verify(secret: &str, payload: &[u8], presented: &str) -> bool {
    let expected = sign(secret, payload);
    constant_time_compare(&expected, presented)
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
