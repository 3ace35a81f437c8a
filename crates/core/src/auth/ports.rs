//! Port interfaces for session handling
//!
//! These traits define the boundaries between the session logic and the
//! infrastructure that persists tokens and talks to the backend.

use async_trait::async_trait;
use tradepost_domain::{AuthResponse, Result, Session, UserProfile};

use super::error::RefreshError;

/// Pluggable persistence for the session
///
/// Reads are cheap and synchronous. `set_session` and `clear` replace the
/// whole session at once: a reader never sees a new access token paired with
/// a stale refresh token.
pub trait TokenStore: Send + Sync {
    /// Current access token, if any
    fn access_token(&self) -> Option<String>;

    /// Current refresh token, if any
    fn refresh_token(&self) -> Option<String>;

    /// Stored user payload, if any
    fn user(&self) -> Option<UserProfile>;

    /// Snapshot of the whole session
    fn session(&self) -> Option<Session> {
        self.access_token().map(|access_token| Session {
            access_token,
            refresh_token: self.refresh_token(),
            user: self.user(),
        })
    }

    /// Replace the stored session
    fn set_session(&self, session: &Session) -> Result<()>;

    /// Remove every session key, legacy aliases included
    fn clear(&self) -> Result<()>;
}

/// Exchanges a refresh token for a new session
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Perform exactly one refresh call
    async fn refresh(&self, refresh_token: &str) -> std::result::Result<AuthResponse, RefreshError>;
}

/// Session notifications for the host application
///
/// Replaces implicit browser redirects: the host decides what "go to login"
/// means.
pub trait SessionListener: Send + Sync {
    /// The session could not be refreshed and has been cleared
    fn on_session_expired(&self);

    /// A refresh succeeded and the store holds the new session
    fn on_session_refreshed(&self) {}
}
