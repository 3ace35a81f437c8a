//! Configuration loading
//!
//! This module loads [`tradepost_domain::ClientConfig`] from `.env`,
//! JSON/TOML files, and environment variables.

pub mod loader;

// Re-export commonly used items
pub use loader::{apply_env, load, load_from_env, load_from_file, probe_config_paths};
