//! Signature scheme for inbound payment gateway webhooks.
//!
//! The gateway sends `Stripe-Signature: t=<unix>,v1=<hex>` where the hex value
//! is HMAC-SHA256 over `"<t>.<raw body>"`. Several `v1` entries may be present
//! while a secret is being rotated.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature header is missing")]
    Missing,
    #[error("signature header is malformed")]
    Malformed,
    #[error("signature timestamp is outside the tolerance window")]
    OutsideTolerance,
    #[error("no signature matches the payload")]
    Mismatch,
}

/// HMAC signature generator for webhook payloads
pub struct SignatureGenerator {
    secret: String,
}

impl SignatureGenerator {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn mac(&self, timestamp: i64, body: &[u8]) -> HmacSha256 {
        // HMAC accepts keys of any length, so this cannot fail
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .unwrap_or_else(|_| unreachable!("HMAC can take key of any size"));
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);
        mac
    }

    /// Hex signature of `body` at `timestamp`
    pub fn sign_payload(&self, timestamp: i64, body: &[u8]) -> String {
        hex::encode(self.mac(timestamp, body).finalize().into_bytes())
    }

    /// Full header value as the gateway would send it
    pub fn header_value(&self, timestamp: i64, body: &[u8]) -> String {
        format!("t={},v1={}", timestamp, self.sign_payload(timestamp, body))
    }

    /// Verify a signature header against the raw body.
    ///
    /// `now` is a unix timestamp; the header's `t` must be within
    /// `tolerance_secs` of it in either direction.
    pub fn verify(
        &self,
        header: Option<&str>,
        body: &[u8],
        tolerance_secs: u64,
        now: i64,
    ) -> Result<(), SignatureError> {
        let header = header.ok_or(SignatureError::Missing)?;

        let mut timestamp: Option<i64> = None;
        let mut candidates = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => {
                    timestamp = Some(value.parse().map_err(|_| SignatureError::Malformed)?)
                }
                Some(("v1", value)) => candidates.push(value),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
        if candidates.is_empty() {
            return Err(SignatureError::Malformed);
        }

        if now.abs_diff(timestamp) > tolerance_secs {
            return Err(SignatureError::OutsideTolerance);
        }

        let matched = candidates.iter().any(|candidate| {
            hex::decode(candidate)
                .map(|expected| self.mac(timestamp, body).verify_slice(&expected).is_ok())
                .unwrap_or(false)
        });

        if matched {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }
}
