//! Client configuration
//!
//! Every field has a default so partial JSON/TOML files and sparse
//! environments load cleanly.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_API_URL, DEFAULT_BASE_DELAY_MS, DEFAULT_HEALTH_PATH, DEFAULT_HEALTH_TIMEOUT_MS,
    DEFAULT_LOGIN_PATH, DEFAULT_LOGOUT_PATH, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY_MS,
    DEFAULT_REFRESH_PATH, DEFAULT_REQUEST_TIMEOUT_MS,
};
use crate::types::MissingExpiryPolicy;

/// API client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Primary base URL (e.g., "https://api.tradepost.market/api")
    pub api_url: String,
    /// Fallback base URL tried when the primary is unreachable
    pub fallback_api_url: Option<String>,
    /// Secondary host tried last
    pub secondary_api_url: Option<String>,
    /// Insert an `http://` twin of an `https://` primary right after it
    pub http_fallback: bool,
    pub request_timeout_ms: u64,
    pub health_timeout_ms: u64,
    pub refresh_path: String,
    pub login_path: String,
    pub logout_path: String,
    pub health_path: String,
    /// WebSocket base URL; carried for the chat collaborator, unused here
    pub websocket_url: Option<String>,
    /// Root domain for cross-subdomain cookie scoping; carried for cookie-backed stores
    pub cookie_domain: Option<String>,
    pub retry: RetrySettings,
    pub missing_expiry: MissingExpiryPolicy,
    /// Seconds before `exp` at which a token already counts as expired
    pub refresh_skew_secs: i64,
    /// Refresh an expired access token before sending instead of waiting for a 401
    pub proactive_refresh: bool,
    /// Attempts for the refresh call itself; 1 means a failed refresh is final
    pub refresh_max_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            fallback_api_url: None,
            secondary_api_url: None,
            http_fallback: false,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            health_timeout_ms: DEFAULT_HEALTH_TIMEOUT_MS,
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            logout_path: DEFAULT_LOGOUT_PATH.to_string(),
            health_path: DEFAULT_HEALTH_PATH.to_string(),
            websocket_url: None,
            cookie_domain: None,
            retry: RetrySettings::default(),
            missing_expiry: MissingExpiryPolicy::default(),
            refresh_skew_secs: 0,
            proactive_refresh: false,
            refresh_max_attempts: 1,
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }
}

/// Retry configuration for idempotent requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl RetrySettings {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}
