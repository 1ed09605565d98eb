// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Webhook signature verification.
//!
//! The general scheme implemented here: HMAC-SHA256 over `v0:<ts>:<body>`,
//! hex-encoded, compared in constant time, with a bounded replay window on
//! `ts`. Source-specific signature schemes beyond this general shape are out
//! of scope; sources that use it directly (as opposed to their own vendor
//! construction) verify through this module.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Maximum allowed skew between the signed timestamp and now, in seconds.
pub const REPLAY_WINDOW_SECS: i64 = 300;

#[derive(Debug, thiserror::Error)]
pub enum WebhookSignatureError {
    #[error("malformed signature header")]
    Malformed,
    #[error("timestamp outside the replay window")]
    ReplayWindowExceeded,
    #[error("signature does not match")]
    Mismatch,
}

/// Verifies `signature` (hex-encoded HMAC-SHA256 of `v0:<ts>:<body>`) against
/// `secret`, rejecting timestamps more than [`REPLAY_WINDOW_SECS`] away from
/// `now`.
pub fn verify(
    secret: &[u8],
    timestamp: i64,
    body: &[u8],
    signature_hex: &str,
    now: i64,
) -> Result<(), WebhookSignatureError> {
    if (now - timestamp).abs() > REPLAY_WINDOW_SECS {
        return Err(WebhookSignatureError::ReplayWindowExceeded);
    }

    let expected = sign(secret, timestamp, body);
    let provided = hex::decode(signature_hex).map_err(|_| WebhookSignatureError::Malformed)?;

    if provided.len() != expected.len() || !bool::from(provided.ct_eq(&expected)) {
        return Err(WebhookSignatureError::Mismatch);
    }
    Ok(())
}

/// Computes the raw HMAC-SHA256 digest of `v0:<ts>:<body>` under `secret`.
pub fn sign(secret: &[u8], timestamp: i64, body: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(format!("v0:{timestamp}:").as_bytes());
    mac.update(body);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_freshly_signed_payload() {
        let secret = b"shh";
        let body = br#"{"event":"incident.triggered"}"#;
        let sig = hex::encode(sign(secret, 1_000, body));
        assert!(verify(secret, 1_000, body, &sig, 1_100).is_ok());
    }

    #[test]
    fn rejects_stale_timestamp() {
        let secret = b"shh";
        let body = b"{}";
        let sig = hex::encode(sign(secret, 1_000, body));
        let err = verify(secret, 1_000, body, &sig, 1_000 + REPLAY_WINDOW_SECS + 1).unwrap_err();
        assert!(matches!(err, WebhookSignatureError::ReplayWindowExceeded));
    }

    #[test]
    fn rejects_tampered_body() {
        let secret = b"shh";
        let sig = hex::encode(sign(secret, 1_000, b"original"));
        let err = verify(secret, 1_000, b"tampered!", &sig, 1_000).unwrap_err();
        assert!(matches!(err, WebhookSignatureError::Mismatch));
    }

    #[test]
    fn rejects_wrong_secret() {
        let sig = hex::encode(sign(b"right-secret", 1_000, b"body"));
        let err = verify(b"wrong-secret", 1_000, b"body", &sig, 1_000).unwrap_err();
        assert!(matches!(err, WebhookSignatureError::Mismatch));
    }

    #[test]
    fn rejects_malformed_hex() {
        let err = verify(b"shh", 1_000, b"body", "not-hex!!", 1_000).unwrap_err();
        assert!(matches!(err, WebhookSignatureError::Malformed));
    }
}
