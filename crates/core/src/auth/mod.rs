//! Session management
//!
//! - [`TokenInspector`] decodes bearer tokens and answers expiry questions
//! - [`RefreshCoordinator`] guarantees at most one refresh call in flight
//! - [`ports`] lists the collaborators the host application provides

pub mod coordinator;
pub mod error;
pub mod inspector;
pub mod ports;

pub use coordinator::{RefreshCoordinator, RefreshState};
pub use error::RefreshError;
pub use inspector::{DecodeError, TokenInspector};
pub use ports::{SessionListener, TokenRefresher, TokenStore};
