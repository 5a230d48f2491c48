//! Razorpay signature verification.
//!
//! Two signatures are in play:
//! - the checkout signature the browser receives after paying, an HMAC of
//!   `"{order_id}|{payment_id}"` keyed with the API key secret;
//! - the webhook signature in `X-Razorpay-Signature`, an HMAC of the raw
//!   request body keyed with the webhook secret.
//!
//! Both are lowercase hex HMAC-SHA256 digests.

use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Hex HMAC-SHA256 of `message` under `secret`.
fn hmac_sha256_hex(secret: &[u8], message: &[u8]) -> Option<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret).ok()?;
    mac.update(message);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Verify the checkout signature returned to the browser.
#[must_use]
pub fn verify_payment_signature(
    key_secret: &str,
    razorpay_order_id: &str,
    razorpay_payment_id: &str,
    signature: &str,
) -> bool {
    let payload = format!("{razorpay_order_id}|{razorpay_payment_id}");
    hmac_sha256_hex(key_secret.as_bytes(), payload.as_bytes())
        .is_some_and(|expected| {
            constant_time_compare(&expected, &signature.trim().to_ascii_lowercase())
        })
}

/// Verify a webhook delivery against its raw body.
#[must_use]
pub fn verify_webhook_signature(webhook_secret: &str, body: &[u8], signature: &str) -> bool {
    hmac_sha256_hex(webhook_secret.as_bytes(), body)
        .is_some_and(|expected| {
            constant_time_compare(&expected, &signature.trim().to_ascii_lowercase())
        })
}

/// Constant-time string comparison to prevent timing attacks.
#[must_use]
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}
