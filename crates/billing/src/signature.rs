//! Gateway signature verification
//!
//! Two HMAC-SHA256 schemes with different secrets: the checkout callback is
//! signed over `order_id|payment_id` with the API key secret, the webhook is
//! signed over the exact raw request body with the dedicated webhook secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verify the redirect-callback signature supplied by the paying client's
/// browser.
pub fn verify_payment_signature(
    key_secret: &str,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> bool {
    let payload = format!("{}|{}", order_id, payment_id);
    verify_hex_hmac(key_secret.as_bytes(), payload.as_bytes(), signature)
}

/// Verify the webhook signature header against the raw, unparsed body.
pub fn verify_webhook_signature(webhook_secret: &str, body: &[u8], signature: &str) -> bool {
    verify_hex_hmac(webhook_secret.as_bytes(), body, signature)
}

fn verify_hex_hmac(key: &[u8], message: &[u8], signature_hex: &str) -> bool {
    let Ok(signature) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        return false;
    };
    mac.update(message);
    // verify_slice performs a constant-time comparison
    mac.verify_slice(&signature).is_ok()
}
