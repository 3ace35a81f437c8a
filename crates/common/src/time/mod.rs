//! Time abstraction
//!
//! Token expiry checks read wall-clock seconds through [`Clock`] so tests can
//! pin "now" with [`MockClock`].

mod clock;

pub use clock::{Clock, MockClock, SystemClock};
