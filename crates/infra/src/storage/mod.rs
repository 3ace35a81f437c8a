//! Session persistence
//!
//! [`KeyValueTokenStore`] implements the core `TokenStore` port on top of any
//! [`KeyValueBackend`]. Two backends ship here: an in-process map and a JSON
//! file that is replaced atomically on every write.

pub mod backend;
pub mod token_store;

pub use backend::{JsonFileBackend, KeyOp, KeyValueBackend, MemoryBackend};
pub use token_store::KeyValueTokenStore;
