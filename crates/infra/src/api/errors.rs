//! API-specific error types
//!
//! Every failure that leaves the API client is one of these variants. Raw
//! transport errors are classified before they cross the client boundary.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tradepost_common::{ErrorClassification, ErrorSeverity};
use tradepost_core::RefreshError;
use tradepost_domain::TradepostError;

/// Categories of API errors for retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCategory {
    /// No response: DNS, connection refused, reset - retryable
    Network,
    /// Per-request timeout elapsed - retryable
    Timeout,
    /// 401 - resolved through the refresh path
    Unauthorized,
    /// 403 - terminal
    Forbidden,
    /// 404 - terminal
    NotFound,
    /// 422 - terminal, carries field details
    Validation,
    /// 5xx - retryable
    Server,
    /// Any other status - terminal
    Unknown,
    /// Local failures (config, storage, serialization) - terminal
    Local,
}

/// API operation errors
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {message}")]
    Validation { message: String, details: Option<Value> },

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Unexpected response{}: {message}", status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Unknown { status: Option<u16>, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ApiError {
    /// Get the error category for this error
    pub fn category(&self) -> ApiErrorCategory {
        match self {
            Self::Network(_) => ApiErrorCategory::Network,
            Self::Timeout(_) => ApiErrorCategory::Timeout,
            Self::Unauthorized(_) => ApiErrorCategory::Unauthorized,
            Self::Forbidden(_) => ApiErrorCategory::Forbidden,
            Self::NotFound(_) => ApiErrorCategory::NotFound,
            Self::Validation { .. } => ApiErrorCategory::Validation,
            Self::Server { .. } => ApiErrorCategory::Server,
            Self::Unknown { .. } => ApiErrorCategory::Unknown,
            Self::Config(_) | Self::Storage(_) | Self::Serialization(_) => ApiErrorCategory::Local,
        }
    }

    /// HTTP status that produced this error, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized(_) => Some(401),
            Self::Forbidden(_) => Some(403),
            Self::NotFound(_) => Some(404),
            Self::Validation { .. } => Some(422),
            Self::Server { status, .. } => Some(*status),
            Self::Unknown { status, .. } => *status,
            _ => None,
        }
    }

    /// Failures that justify trying the next endpoint candidate
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self.category(),
            ApiErrorCategory::Network | ApiErrorCategory::Timeout | ApiErrorCategory::Server
        )
    }

    pub fn requires_refresh(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

impl ErrorClassification for ApiError {
    fn is_retryable(&self) -> bool {
        self.is_connectivity()
    }

    fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ApiErrorCategory::Network | ApiErrorCategory::Timeout => ErrorSeverity::Warning,
            ApiErrorCategory::Unauthorized
            | ApiErrorCategory::Forbidden
            | ApiErrorCategory::NotFound
            | ApiErrorCategory::Validation => ErrorSeverity::Info,
            ApiErrorCategory::Server | ApiErrorCategory::Unknown => ErrorSeverity::Error,
            ApiErrorCategory::Local => ErrorSeverity::Critical,
        }
    }
}

/// A failed refresh always surfaces as Unauthorized
impl From<RefreshError> for ApiError {
    fn from(err: RefreshError) -> Self {
        Self::Unauthorized(format!("session refresh failed: {err}"))
    }
}

impl From<TradepostError> for ApiError {
    fn from(err: TradepostError) -> Self {
        match err {
            TradepostError::Config(message) | TradepostError::InvalidInput(message) => {
                Self::Config(message)
            }
            TradepostError::Storage(message) => Self::Storage(message),
            TradepostError::Serialization(message) => Self::Serialization(message),
        }
    }
}
