//! Maps raw transport outcomes onto [`ApiError`]

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;
use tracing::warn;

use super::errors::ApiError;

const MAX_MESSAGE_CHARS: usize = 512;

/// Classify a non-success HTTP status and its body
pub fn classify_status(status: StatusCode, body: &[u8]) -> ApiError {
    let parsed: Option<Value> = serde_json::from_slice(body).ok();
    let message = extract_message(status, parsed.as_ref(), body);

    match status.as_u16() {
        401 => ApiError::Unauthorized(message),
        403 => ApiError::Forbidden(message),
        404 => ApiError::NotFound(message),
        422 => {
            let details = parsed.as_ref().and_then(|body| body.get("errors")).cloned();
            ApiError::Validation { message, details }
        }
        502 => {
            warn!(status = 502, "service unavailable");
            ApiError::Server { status: 502, message }
        }
        code @ 500..=599 => ApiError::Server { status: code, message },
        code => ApiError::Unknown { status: Some(code), message },
    }
}

/// Classify a request that produced no response
pub fn classify_transport(err: &reqwest::Error, timeout: Duration) -> ApiError {
    if err.is_timeout() {
        return ApiError::Timeout(timeout);
    }
    if err.is_builder() {
        return ApiError::Config(err.to_string());
    }
    ApiError::Network(err.to_string())
}

fn extract_message(status: StatusCode, parsed: Option<&Value>, body: &[u8]) -> String {
    let from_json = parsed.and_then(|value| {
        ["message", "error"]
            .iter()
            .find_map(|key| value.get(*key).and_then(Value::as_str))
            .map(str::to_string)
    });

    if let Some(message) = from_json {
        return message;
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() || parsed.is_some() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        text.chars().take(MAX_MESSAGE_CHARS).collect()
    }
}
