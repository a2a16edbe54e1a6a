//! Injected time source for the scheduler
//!
//! The store and the flush loop take all timestamps from a `Clock` so that
//! tests can control the passage of time without sleeping.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync {
    /// Monotonic instant used for scheduling arithmetic.
    fn now(&self) -> Instant;

    /// Wall-clock milliseconds since the Unix epoch, for event timestamps.
    fn unix_millis(&self) -> i64;
}

pub type SharedClock = Arc<dyn Clock>;

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn unix_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

/// Clock that only moves when advanced explicitly. Intended for tests.
pub struct ManualClock {
    base: Instant,
    base_millis: i64,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            base_millis: SystemClock.unix_millis(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap();
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock().unwrap()
    }

    fn unix_millis(&self) -> i64 {
        self.base_millis + self.offset.lock().unwrap().as_millis() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new();
        let start = clock.now();

        clock.advance(Duration::from_secs(30));

        assert_eq!(clock.now() - start, Duration::from_secs(30));
    }

    #[test]
    fn test_manual_clock_millis_track_offset() {
        let clock = ManualClock::new();
        let start = clock.unix_millis();

        clock.advance(Duration::from_millis(1500));

        assert_eq!(clock.unix_millis() - start, 1500);
    }
}
