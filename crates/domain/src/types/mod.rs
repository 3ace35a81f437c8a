//! Domain types and models

pub mod claims;
pub mod endpoints;
pub mod session;

pub use claims::{Claims, MissingExpiryPolicy};
pub use endpoints::EndpointList;
pub use session::{AuthResponse, Credentials, Session, UserProfile};
