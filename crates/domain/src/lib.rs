//! # Tradepost Domain
//!
//! Data types shared by every layer of the Tradepost API client.
//!
//! This crate contains:
//! - Session and token claim models
//! - Client configuration and the endpoint candidate list
//! - Persisted session key names
//! - Domain error types and Result definitions
//!
//! ## Architecture
//! - No dependencies on other Tradepost crates
//! - Only external dependencies allowed
//! - Pure data structures, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
