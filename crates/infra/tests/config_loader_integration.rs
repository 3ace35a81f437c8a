//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files and
//! handing it to the API client.

use std::io::Write;

use tempfile::NamedTempFile;
use tradepost_domain::{EndpointList, MissingExpiryPolicy, TradepostError};
use tradepost_infra::{config, ApiClient};

fn config_file(suffix: &str, contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .prefix("tradepost")
        .suffix(suffix)
        .tempfile()
        .expect("Failed to create temp file");
    file.write_all(contents.as_bytes()).expect("Failed to write to temp file");
    file
}

#[test]
fn test_load_config_from_json_file() {
    let file = config_file(
        ".json",
        r#"{
            "api_url": "https://api.tradepost.test/api",
            "fallback_api_url": "https://fallback.tradepost.test/api",
            "request_timeout_ms": 15000,
            "retry": { "max_attempts": 4, "base_delay_ms": 250, "max_delay_ms": 2000 },
            "missing_expiry": "treat_as_expired",
            "refresh_skew_secs": 30
        }"#,
    );

    let result = config::load_from_file(Some(file.path().to_path_buf()));
    assert!(result.is_ok(), "Failed to load config from JSON file: {result:?}");

    let config = result.unwrap();

    assert_eq!(config.api_url, "https://api.tradepost.test/api");
    assert_eq!(config.fallback_api_url.as_deref(), Some("https://fallback.tradepost.test/api"));
    assert_eq!(config.request_timeout_ms, 15_000);
    assert_eq!(config.retry.max_attempts, 4);
    assert_eq!(config.retry.base_delay_ms, 250);
    assert_eq!(config.missing_expiry, MissingExpiryPolicy::TreatAsExpired);
    assert_eq!(config.refresh_skew_secs, 30);

    // Unset fields keep their defaults
    assert_eq!(config.login_path, "/auth/login");
    assert!(!config.proactive_refresh);
}

#[test]
fn test_load_config_from_toml_file() {
    let file = config_file(
        ".toml",
        r#"
api_url = "https://api.tradepost.test/api"
secondary_api_url = "https://eu.tradepost.test/api"
http_fallback = true
websocket_url = "wss://ws.tradepost.test"
cookie_domain = ".tradepost.test"

[retry]
max_attempts = 2
"#,
    );

    let config = config::load_from_file(Some(file.path().to_path_buf()))
        .expect("Failed to load config from TOML file");

    assert!(config.http_fallback);
    assert_eq!(config.websocket_url.as_deref(), Some("wss://ws.tradepost.test"));
    assert_eq!(config.cookie_domain.as_deref(), Some(".tradepost.test"));
    assert_eq!(config.retry.max_attempts, 2);

    // Primary, its http twin, then the secondary host
    let endpoints = EndpointList::from_config(&config).unwrap();
    let bases: Vec<&str> = endpoints.iter().collect();
    assert_eq!(
        bases,
        vec![
            "https://api.tradepost.test/api",
            "http://api.tradepost.test/api",
            "https://eu.tradepost.test/api",
        ]
    );
}

#[test]
fn test_loaded_config_builds_a_client() {
    let file = config_file(".json", r#"{ "api_url": "https://api.tradepost.test/api" }"#);

    let config = config::load_from_file(Some(file.path().to_path_buf())).unwrap();
    let client = ApiClient::new(config).expect("client should build from a loaded config");

    assert_eq!(client.config().api_url, "https://api.tradepost.test/api");
    assert!(!client.is_authenticated());
}

#[test]
fn test_load_config_from_nonexistent_file() {
    let result = config::load_from_file(Some("/nonexistent/path/tradepost.json".into()));

    match result {
        Err(TradepostError::Config(msg)) => {
            assert!(msg.contains("not found"), "Error message should mention 'not found'");
        }
        other => panic!("Expected Config error, got {other:?}"),
    }
}

#[test]
fn test_load_config_with_invalid_format() {
    let file = config_file(".json", r#"{ "this is": "not valid" "#);

    let result = config::load_from_file(Some(file.path().to_path_buf()));

    match result {
        Err(TradepostError::Config(msg)) => {
            assert!(msg.contains("Invalid JSON"), "Error message should mention invalid JSON");
        }
        other => panic!("Expected Config error, got {other:?}"),
    }
}

#[test]
fn test_load_config_with_wrong_field_type() {
    let file = config_file(".toml", "request_timeout_ms = \"soon\"\n");

    let result = config::load_from_file(Some(file.path().to_path_buf()));

    assert!(matches!(result, Err(TradepostError::Config(msg)) if msg.contains("Invalid TOML")));
}
