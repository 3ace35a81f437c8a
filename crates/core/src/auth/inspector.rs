//! Bearer token inspection
//!
//! Claims are read without verifying the signature: the backend is the
//! authority, the client only needs to know when a token is worth sending.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use thiserror::Error;
use tradepost_common::{Clock, SystemClock};
use tradepost_domain::{Claims, MissingExpiryPolicy};

/// Why a token could not be decoded
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("expected 3 dot-separated segments, found {0}")]
    Malformed(usize),

    #[error("payload is not valid base64: {0}")]
    Base64(String),

    #[error("payload is not valid claims JSON: {0}")]
    Json(String),
}

/// Decodes tokens and evaluates expiry against a [`Clock`]
#[derive(Clone)]
pub struct TokenInspector {
    clock: Arc<dyn Clock>,
    missing_expiry: MissingExpiryPolicy,
}

impl Default for TokenInspector {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl std::fmt::Debug for TokenInspector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenInspector").field("missing_expiry", &self.missing_expiry).finish()
    }
}

impl TokenInspector {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock, missing_expiry: MissingExpiryPolicy::default() }
    }

    #[must_use]
    pub fn with_missing_expiry(mut self, policy: MissingExpiryPolicy) -> Self {
        self.missing_expiry = policy;
        self
    }

    /// Decode the claims of a `header.payload.signature` token
    ///
    /// # Errors
    /// Returns [`DecodeError`] for any malformed input; never panics.
    pub fn decode(token: &str) -> Result<Claims, DecodeError> {
        let segments: Vec<&str> = token.trim().split('.').collect();
        if segments.len() != 3 {
            return Err(DecodeError::Malformed(segments.len()));
        }

        // Accept the standard alphabet and padding from lenient issuers.
        let payload: String = segments[1]
            .trim_end_matches('=')
            .chars()
            .map(|c| match c {
                '+' => '-',
                '/' => '_',
                other => other,
            })
            .collect();

        let bytes =
            URL_SAFE_NO_PAD.decode(payload.as_bytes()).map_err(|e| DecodeError::Base64(e.to_string()))?;

        serde_json::from_slice::<Claims>(&bytes).map_err(|e| DecodeError::Json(e.to_string()))
    }

    /// True when the token should no longer be sent
    ///
    /// Undecodable tokens count as expired. A token without `exp` follows the
    /// configured [`MissingExpiryPolicy`] (not expired by default). Otherwise
    /// the token is live while `now < exp - skew_secs`.
    pub fn is_expired(&self, token: &str, skew_secs: i64) -> bool {
        match Self::decode(token) {
            Ok(claims) => self.claims_expired(&claims, skew_secs),
            Err(_) => true,
        }
    }

    /// Decodes to well-formed claims and is not expired
    pub fn is_valid(&self, token: &str) -> bool {
        !self.is_expired(token, 0)
    }

    /// Seconds until `exp`, negative once expired; `None` without `exp`
    pub fn seconds_until_expiry(&self, token: &str) -> Option<i64> {
        let expiry = Self::decode(token).ok()?.expiry_epoch_seconds?;
        Some(expiry.saturating_sub(self.clock.epoch_seconds()))
    }

    fn claims_expired(&self, claims: &Claims, skew_secs: i64) -> bool {
        match claims.expiry_epoch_seconds {
            Some(expiry) => self.clock.epoch_seconds() >= expiry.saturating_sub(skew_secs),
            None => self.missing_expiry == MissingExpiryPolicy::TreatAsExpired,
        }
    }
}
