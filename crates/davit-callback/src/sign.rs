//! Request signing for the callback wire protocol.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::CallbackError;

type HmacSha256 = Hmac<Sha256>;

/// Compute the hex HMAC-SHA256 signature over `"<timestamp>.<body>"`.
///
/// The receiver recomputes the same digest from the `X-Timestamp` header and
/// the raw request body to verify the sender holds the shared secret.
///
/// # Errors
///
/// Returns [`CallbackError::InvalidSecret`] if the HMAC implementation
/// rejects the key, which cannot happen for SHA-256 but is propagated rather
/// than asserted away.
pub fn sign_payload(secret: &str, timestamp: i64, body: &str) -> Result<String, CallbackError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| CallbackError::InvalidSecret)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}
