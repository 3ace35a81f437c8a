//! # Tradepost Core
//!
//! Session logic of the API client, free of HTTP and storage details.
//!
//! This crate contains:
//! - Port interfaces (token storage, token refresh, session notifications)
//! - Token inspection (claims decoding, expiry)
//! - The refresh coordinator (single-flight token refresh)
//!
//! ## Architecture Principles
//! - Depends only on `tradepost-common` and `tradepost-domain`
//! - All external collaborators via traits

pub mod auth;

pub use auth::{
    DecodeError, RefreshCoordinator, RefreshError, RefreshState, SessionListener, TokenInspector,
    TokenRefresher, TokenStore,
};
