#[cfg(any(test, feature = "test-util"))]
use jiff::SignedDuration;
use jiff::Timestamp;
#[cfg(any(test, feature = "test-util"))]
use parking_lot::Mutex;
#[cfg(any(test, feature = "test-util"))]
use std::sync::Arc;

/// A source of wall-clock time for cache timestamps and expiry checks.
pub trait Clock: Send + Sync + 'static {
    /// Returns the current time of the clock.
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock that only moves when told to.
///
/// Cloned handles share the same time, so a test can keep one handle and
/// advance the clock a store is reading from.
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Timestamp>>,
}

#[cfg(any(test, feature = "test-util"))]
impl ManualClock {
    pub fn new(now: Timestamp) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: SignedDuration) {
        let mut now = self.now.lock();
        *now = *now + by;
    }

    pub fn set(&self, to: Timestamp) {
        *self.now.lock() = to;
    }
}

#[cfg(any(test, feature = "test-util"))]
impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock()
    }
}
