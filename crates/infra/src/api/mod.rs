//! Resilient API client
//!
//! Every call goes through [`RequestExecutor`], which attaches the bearer
//! token, fails over across the configured endpoints, retries idempotent
//! requests with backoff, and funnels 401s into the shared
//! [`tradepost_core::RefreshCoordinator`].
//!
//! # Layout
//!
//! - [`client`]: the [`ApiClient`] facade (verbs, health check, login/logout)
//! - [`executor`]: attempt rounds, failover, retry, 401 handling
//! - [`middleware`]: request/response hooks (JSON headers, logging)
//! - [`classify`]: status and transport failures to [`ApiError`]
//! - [`auth`]: HTTP implementation of the refresh port

pub mod auth;
pub mod classify;
pub mod client;
pub mod errors;
pub mod executor;
pub mod middleware;
pub mod request;

pub use auth::HttpTokenRefresher;
pub use client::{ApiClient, ApiClientBuilder};
pub use errors::{ApiError, ApiErrorCategory};
pub use executor::{ExecutorSettings, RequestExecutor};
pub use middleware::{
    JsonHeaders, Pipeline, PreparedRequest, RequestLogger, RequestMiddleware, ResponseMiddleware,
};
pub use request::{ApiResponse, MultipartUpload, RequestBody, RequestDescriptor};
