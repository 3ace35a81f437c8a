//! Refresh error types

use thiserror::Error;
use tradepost_common::{ErrorClassification, ErrorSeverity};

/// Why a token refresh failed
///
/// `Clone` so one failure can be handed to every queued caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RefreshError {
    #[error("No refresh token available")]
    NoRefreshToken,

    #[error("Refresh rejected with status {status}")]
    Rejected { status: u16 },

    #[error("Refresh request failed: {0}")]
    Transport(String),

    #[error("Invalid refresh response: {0}")]
    InvalidResponse(String),

    #[error("Failed to persist refreshed session: {0}")]
    Storage(String),

    #[error("Refresh task ended without a result")]
    Aborted,
}

impl ErrorClassification for RefreshError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NoRefreshToken | Self::Rejected { .. } => ErrorSeverity::Warning,
            Self::Transport(_) | Self::InvalidResponse(_) | Self::Aborted => ErrorSeverity::Error,
            Self::Storage(_) => ErrorSeverity::Critical,
        }
    }
}
