use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Trait for time operations to enable testing
pub trait Clock: Send + Sync {
    /// Current instant (monotonic time)
    fn now(&self) -> Instant;

    /// Current system time (wall clock)
    fn system_time(&self) -> SystemTime;

    /// Whole seconds since the UNIX epoch, the unit of JWT `exp`/`iat`
    fn epoch_seconds(&self) -> i64 {
        self.system_time().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
    }

    /// Milliseconds since the UNIX epoch
    fn millis_since_epoch(&self) -> u64 {
        self.system_time().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
    }
}

/// Real system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Mock clock for deterministic testing
///
/// Cloned handles share the same elapsed offset, so a test can keep one
/// handle and hand another to the code under test.
///
/// ```
/// use std::time::Duration;
///
/// use tradepost_common::time::{Clock, MockClock};
///
/// let clock = MockClock::at_epoch_seconds(1_700_000_000);
/// clock.advance(Duration::from_secs(5));
/// assert_eq!(clock.epoch_seconds(), 1_700_000_005);
/// ```
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
    base_system_time: SystemTime,
}

impl MockClock {
    /// Start at the current real time
    pub fn new() -> Self {
        Self::starting_at(SystemTime::now())
    }

    /// Start at a fixed wall-clock time
    pub fn starting_at(base_system_time: SystemTime) -> Self {
        Self { start: Instant::now(), elapsed: Arc::new(Mutex::new(Duration::ZERO)), base_system_time }
    }

    /// Start at a fixed number of seconds since the UNIX epoch
    pub fn at_epoch_seconds(seconds: u64) -> Self {
        Self::starting_at(UNIX_EPOCH + Duration::from_secs(seconds))
    }

    /// Simulate time passing without waiting
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    /// Replace the elapsed offset
    pub fn set_elapsed(&self, duration: Duration) {
        *self.elapsed.lock() = duration;
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + *self.elapsed.lock()
    }

    fn system_time(&self) -> SystemTime {
        self.base_system_time + *self.elapsed.lock()
    }
}
