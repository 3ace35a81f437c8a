//! # Tradepost Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - The HTTP transport and the resilient API client
//! - Session persistence (in-memory and JSON file key/value stores)
//! - Configuration loading (files, `.env`, environment overrides)
//! - Tracing subscriber setup
//!
//! ## Architecture
//! - Implements traits defined in `tradepost-core`
//! - Depends on `tradepost-common`, `tradepost-domain` and `tradepost-core`
//! - Contains all "impure" code (network, filesystem, environment)

pub mod api;
pub mod config;
pub mod http;
pub mod observability;
pub mod storage;

// Re-export commonly used items
pub use api::{
    ApiClient, ApiClientBuilder, ApiError, ApiErrorCategory, ApiResponse, MultipartUpload,
    RequestDescriptor,
};
pub use http::{HttpClient, HttpClientBuilder};
pub use observability::{init_tracing, LogFormat};
pub use storage::{JsonFileBackend, KeyValueBackend, KeyValueTokenStore, MemoryBackend};
