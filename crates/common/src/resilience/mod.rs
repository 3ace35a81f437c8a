//! Resilience patterns
//!
//! Bounded exponential backoff for transient failures. Whether an error is
//! worth another attempt is decided by its [`ErrorClassification`].
//!
//! [`ErrorClassification`]: crate::error::ErrorClassification

pub mod retry;

pub use retry::{backoff_delay, should_retry, RetryDecision, RetryPolicy};
