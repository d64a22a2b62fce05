//! Controllable wall clock
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use thermowatch_common::auth::Clock;
//! use thermowatch_common::testing::MockClock;
//!
//! let clock = MockClock::at_millis(1_000);
//! clock.advance(Duration::from_secs(5));
//! assert_eq!(clock.millis_since_epoch(), 6_000);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::auth::Clock;

/// Mock clock for deterministic expiry tests
///
/// Clones share the same time, so a test can keep one handle and give the
/// other to the service under test.
#[derive(Debug, Clone)]
pub struct MockClock {
    millis: Arc<AtomicU64>,
}

impl MockClock {
    /// Start at the current real time
    #[must_use]
    pub fn new() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default();
        Self::at_millis(now)
    }

    /// Start at a fixed epoch-millisecond timestamp
    #[must_use]
    pub fn at_millis(millis: u64) -> Self {
        Self { millis: Arc::new(AtomicU64::new(millis)) }
    }

    /// Simulate time passing without waiting
    pub fn advance(&self, duration: Duration) {
        let step = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.millis.fetch_add(step, Ordering::SeqCst);
    }

    pub fn set_millis(&self, millis: u64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn system_time(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.millis.load(Ordering::SeqCst))
    }

    fn millis_since_epoch(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}
