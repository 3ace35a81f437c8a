//! Configuration loader
//!
//! Loads client configuration from a file and/or environment variables.
//!
//! ## Loading Strategy
//! 1. Loads a `.env` file from the working directory, if present
//! 2. Starts from the first config file found by [`probe_config_paths`], or
//!    from defaults when there is none
//! 3. Applies environment variable overrides on top
//!
//! ## Environment Variables
//! All optional; each overrides the value from the file or the default.
//! - `TRADEPOST_API_URL`: Primary API base URL
//! - `TRADEPOST_FALLBACK_API_URL`: Fallback base URL
//! - `TRADEPOST_SECONDARY_API_URL`: Secondary host, tried last
//! - `TRADEPOST_HTTP_FALLBACK`: Also try `http://` for an `https://` primary
//! - `TRADEPOST_REQUEST_TIMEOUT_MS`: Per-request timeout in milliseconds
//! - `TRADEPOST_WS_URL`: WebSocket base URL (passed through)
//! - `TRADEPOST_ROOT_DOMAIN`: Cookie scoping domain (passed through)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./tradepost.json` or `./tradepost.toml` (current working directory)
//! 2. `./config.json` or `./config.toml` (current working directory)
//! 3. The same names in the parent and grandparent directories

use std::path::{Path, PathBuf};

use tradepost_domain::{ClientConfig, Result, TradepostError};

const FILE_STEMS: [&str; 2] = ["tradepost", "config"];
const EXTENSIONS: [&str; 2] = ["json", "toml"];

/// Load configuration: `.env`, then file (if any), then environment
///
/// # Errors
/// Returns `TradepostError::Config` if a config file exists but is invalid,
/// or an environment variable has an invalid value.
pub fn load() -> Result<ClientConfig> {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env file"),
        Err(e) => tracing::trace!(error = %e, "No .env file loaded"),
    }

    let base = match probe_config_paths() {
        Some(path) => load_from_file(Some(path))?,
        None => {
            tracing::debug!("No config file found, using defaults");
            ClientConfig::default()
        }
    };

    let config = apply_env(base)?;
    tracing::info!(api_url = %config.api_url, "Configuration loaded");
    Ok(config)
}

/// Load configuration from environment variables over the defaults
///
/// # Errors
/// Returns `TradepostError::Config` if a variable has an invalid value.
pub fn load_from_env() -> Result<ClientConfig> {
    apply_env(ClientConfig::default())
}

/// Apply `TRADEPOST_*` overrides to `config`
///
/// # Errors
/// Returns `TradepostError::Config` if a variable has an invalid value.
pub fn apply_env(mut config: ClientConfig) -> Result<ClientConfig> {
    if let Some(url) = env_var("TRADEPOST_API_URL") {
        config.api_url = url;
    }
    if let Some(url) = env_var("TRADEPOST_FALLBACK_API_URL") {
        config.fallback_api_url = Some(url);
    }
    if let Some(url) = env_var("TRADEPOST_SECONDARY_API_URL") {
        config.secondary_api_url = Some(url);
    }
    if let Some(timeout) = env_var("TRADEPOST_REQUEST_TIMEOUT_MS") {
        config.request_timeout_ms = timeout.parse::<u64>().map_err(|e| {
            TradepostError::Config(format!("Invalid TRADEPOST_REQUEST_TIMEOUT_MS: {}", e))
        })?;
    }
    if let Some(url) = env_var("TRADEPOST_WS_URL") {
        config.websocket_url = Some(url);
    }
    if let Some(domain) = env_var("TRADEPOST_ROOT_DOMAIN") {
        config.cookie_domain = Some(domain);
    }
    config.http_fallback = env_bool("TRADEPOST_HTTP_FALLBACK", config.http_fallback);

    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations.
/// Supports both JSON and TOML formats (detected by file extension).
/// Missing fields take their defaults.
///
/// # Errors
/// Returns `TradepostError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(TradepostError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            TradepostError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| TradepostError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
///
/// # Errors
/// Returns `TradepostError::Config` if format is invalid or parsing fails.
fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| TradepostError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| TradepostError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(TradepostError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe for configuration files
///
/// Searches `tradepost.{json,toml}` then `config.{json,toml}` in the working
/// directory, then in its parent and grandparent.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    probe_from(&cwd)
}

fn probe_from(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .take(3)
        .flat_map(|dir| {
            FILE_STEMS.iter().flat_map(move |stem| {
                EXTENSIONS.iter().map(move |ext| dir.join(format!("{stem}.{ext}")))
            })
        })
        .find(|path| path.is_file())
}

/// Read an environment variable, treating empty values as unset
fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    env_var(key)
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use tradepost_domain::MissingExpiryPolicy;

    use super::*;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_KEYS: [&str; 7] = [
        "TRADEPOST_API_URL",
        "TRADEPOST_FALLBACK_API_URL",
        "TRADEPOST_SECONDARY_API_URL",
        "TRADEPOST_REQUEST_TIMEOUT_MS",
        "TRADEPOST_WS_URL",
        "TRADEPOST_ROOT_DOMAIN",
        "TRADEPOST_HTTP_FALLBACK",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock();

        for value in ["1", "true", "yes", "on", "TRUE"] {
            std::env::set_var("TRADEPOST_TEST_BOOL", value);
            assert!(env_bool("TRADEPOST_TEST_BOOL", false), "{value} should be true");
        }
        for value in ["0", "false", "no", "off"] {
            std::env::set_var("TRADEPOST_TEST_BOOL", value);
            assert!(!env_bool("TRADEPOST_TEST_BOOL", true), "{value} should be false");
        }

        std::env::remove_var("TRADEPOST_TEST_BOOL");
        assert!(env_bool("TRADEPOST_TEST_BOOL", true));
        assert!(!env_bool("TRADEPOST_TEST_BOOL", false));
    }

    #[test]
    fn test_load_from_env_defaults_when_unset() {
        let _guard = ENV_LOCK.lock();
        clear_env();

        let config = load_from_env().unwrap();

        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_load_from_env_overrides() {
        let _guard = ENV_LOCK.lock();
        clear_env();
        std::env::set_var("TRADEPOST_API_URL", "https://api.tradepost.test/api");
        std::env::set_var("TRADEPOST_FALLBACK_API_URL", "https://backup.tradepost.test/api");
        std::env::set_var("TRADEPOST_REQUEST_TIMEOUT_MS", "2500");
        std::env::set_var("TRADEPOST_WS_URL", "wss://ws.tradepost.test");
        std::env::set_var("TRADEPOST_ROOT_DOMAIN", ".tradepost.test");
        std::env::set_var("TRADEPOST_HTTP_FALLBACK", "yes");

        let config = load_from_env().unwrap();
        clear_env();

        assert_eq!(config.api_url, "https://api.tradepost.test/api");
        assert_eq!(config.fallback_api_url.as_deref(), Some("https://backup.tradepost.test/api"));
        assert_eq!(config.request_timeout_ms, 2500);
        assert_eq!(config.websocket_url.as_deref(), Some("wss://ws.tradepost.test"));
        assert_eq!(config.cookie_domain.as_deref(), Some(".tradepost.test"));
        assert!(config.http_fallback);
    }

    #[test]
    fn test_load_from_env_invalid_number() {
        let _guard = ENV_LOCK.lock();
        clear_env();
        std::env::set_var("TRADEPOST_REQUEST_TIMEOUT_MS", "soon");

        let result = load_from_env();
        clear_env();

        assert!(matches!(result, Err(TradepostError::Config(_))));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let _guard = ENV_LOCK.lock();
        clear_env();
        std::env::set_var("TRADEPOST_API_URL", "https://env.tradepost.test/api");

        let from_file = ClientConfig {
            api_url: "https://file.tradepost.test/api".into(),
            request_timeout_ms: 1234,
            ..ClientConfig::default()
        };
        let config = apply_env(from_file).unwrap();
        clear_env();

        assert_eq!(config.api_url, "https://env.tradepost.test/api");
        assert_eq!(config.request_timeout_ms, 1234);
    }

    #[test]
    fn test_parse_config_json_partial() {
        let json_content = r#"{
            "api_url": "https://api.tradepost.test/api",
            "retry": { "max_attempts": 5 },
            "missing_expiry": "expired"
        }"#;

        let config = parse_config(json_content, Path::new("tradepost.json")).unwrap();

        assert_eq!(config.api_url, "https://api.tradepost.test/api");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 1_000);
        assert_eq!(config.missing_expiry, MissingExpiryPolicy::TreatAsExpired);
        assert_eq!(config.refresh_path, "/auth/refresh");
    }

    #[test]
    fn test_parse_config_toml() {
        let toml_content = r#"
api_url = "https://api.tradepost.test/api"
secondary_api_url = "https://eu.tradepost.test/api"
proactive_refresh = true

[retry]
max_attempts = 2
max_delay_ms = 4000
"#;

        let config = parse_config(toml_content, Path::new("tradepost.toml")).unwrap();

        assert_eq!(config.secondary_api_url.as_deref(), Some("https://eu.tradepost.test/api"));
        assert!(config.proactive_refresh);
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.max_delay_ms, 4_000);
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("api_url: x", Path::new("tradepost.yaml"));
        assert!(result.is_err(), "Should fail with unsupported format");
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/tradepost.json")));
        assert!(matches!(result, Err(TradepostError::Config(_))));
    }

    #[test]
    fn test_probe_prefers_tradepost_over_config_and_walks_up() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("app").join("bin");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(probe_from(&nested), None);

        std::fs::write(root.path().join("config.toml"), "").unwrap();
        assert_eq!(probe_from(&nested), Some(root.path().join("config.toml")));

        std::fs::write(root.path().join("tradepost.json"), "{}").unwrap();
        assert_eq!(probe_from(&nested), Some(root.path().join("tradepost.json")));

        std::fs::write(nested.join("config.json"), "{}").unwrap();
        assert_eq!(probe_from(&nested), Some(nested.join("config.json")));
    }
}
