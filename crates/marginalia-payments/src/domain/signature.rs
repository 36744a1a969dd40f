//! Webhook signature verification.
//!
//! The provider signs `"<t>.<body>"` with HMAC-SHA256 and sends
//! `t=<unix seconds>,v1=<hex digest>` in the signature header. Several `v1`
//! entries may be present while a secret is being rotated.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use marginalia_core::error::DomainError;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verifies notification signatures with a shared secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: Vec<u8>,
    tolerance: Duration,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("tolerance", &self.tolerance)
            .finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    /// Creates a verifier. Notifications whose timestamp is further than
    /// `tolerance` from now are refused.
    pub fn new(secret: impl Into<Vec<u8>>, tolerance: Duration) -> Self {
        Self {
            secret: secret.into(),
            tolerance,
        }
    }

    /// Checks `header` against `body`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::BadSignature` if the header is missing parts,
    /// the timestamp is outside the tolerance, or no digest matches.
    pub fn verify(&self, header: &str, body: &[u8], now: DateTime<Utc>) -> Result<(), DomainError> {
        let mut timestamp = None;
        let mut digests = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
                Some(("v1", value)) => digests.push(value),
                _ => {}
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| DomainError::BadSignature("missing timestamp".into()))?;
        if digests.is_empty() {
            return Err(DomainError::BadSignature("missing v1 digest".into()));
        }
        let skew = (now.timestamp() - timestamp).abs();
        if skew > self.tolerance.num_seconds() {
            return Err(DomainError::BadSignature(format!(
                "timestamp is {skew}s away from now"
            )));
        }

        for digest in digests {
            let Ok(expected) = hex::decode(digest) else {
                continue;
            };
            let mut mac = HmacSha256::new_from_slice(&self.secret)
                .map_err(|e| DomainError::Infrastructure(format!("hmac key: {e}")))?;
            mac.update(timestamp.to_string().as_bytes());
            mac.update(b".");
            mac.update(body);
            if mac.verify_slice(&expected).is_ok() {
                return Ok(());
            }
        }
        Err(DomainError::BadSignature("no digest matches".into()))
    }
}
