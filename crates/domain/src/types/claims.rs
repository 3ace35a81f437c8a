//! Bearer token claims
//!
//! Claims are never stored; they are decoded from the raw token on demand.

use serde::{Deserialize, Serialize};

/// Claims carried in the payload segment of a bearer token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawClaims")]
pub struct Claims {
    pub subject: Option<String>,
    pub expiry_epoch_seconds: Option<i64>,
    pub issued_at_epoch_seconds: Option<i64>,
    pub roles: Vec<String>,
}

/// Wire shape: backends disagree on the subject key and on `role` vs `roles`.
#[derive(Deserialize)]
struct RawClaims {
    #[serde(default)]
    sub: Option<serde_json::Value>,
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default, rename = "userId")]
    user_id: Option<serde_json::Value>,
    #[serde(default)]
    exp: Option<f64>,
    #[serde(default)]
    iat: Option<f64>,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    role: Option<String>,
}

impl From<RawClaims> for Claims {
    fn from(raw: RawClaims) -> Self {
        let subject = raw.sub.or(raw.id).or(raw.user_id).and_then(|value| match value {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

        let mut roles = raw.roles;
        if let Some(role) = raw.role {
            if !roles.contains(&role) {
                roles.push(role);
            }
        }

        Self {
            subject,
            expiry_epoch_seconds: raw.exp.map(|v| v as i64),
            issued_at_epoch_seconds: raw.iat.map(|v| v as i64),
            roles,
        }
    }
}

impl Claims {
    /// Returns true if the claims grant `role`
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// How to treat a well-formed token that carries no `exp` claim
///
/// The marketplace backends historically accepted such tokens forever, so
/// `TreatAsValid` is the default. `TreatAsExpired` is the stricter option.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingExpiryPolicy {
    #[default]
    #[serde(alias = "valid")]
    TreatAsValid,
    #[serde(alias = "expired")]
    TreatAsExpired,
}
