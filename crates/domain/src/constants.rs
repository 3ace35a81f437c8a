//! Application constants
//!
//! Persisted session key names and client defaults.

// Session keys. The first entry of each alias list is the one written; the
// rest are read for legacy writers and removed on clear.
pub const ACCESS_TOKEN_KEYS: &[&str] = &["token", "authToken", "accessToken"];
pub const REFRESH_TOKEN_KEYS: &[&str] = &["refreshToken", "refresh_token"];
pub const USER_KEYS: &[&str] = &["user", "userData"];

// Client defaults
pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_HEALTH_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";
pub const DEFAULT_LOGIN_PATH: &str = "/auth/login";
pub const DEFAULT_LOGOUT_PATH: &str = "/auth/logout";
pub const DEFAULT_HEALTH_PATH: &str = "/health";

// Retry defaults
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;
pub const DEFAULT_MAX_DELAY_MS: u64 = 10_000;
