//! Time source for the pipeline.
//!
//! Every timestamp the pipeline records comes either from the caller
//! (`on_frame_at`) or from a `Clock`, so the whole engine can be driven
//! without real wall-clock waiting.

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;

pub type Timestamp = DateTime<Utc>;

/// Anything that can tell the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// A clock starting at `millis` after the Unix epoch.
    pub fn at_millis(millis: i64) -> Self {
        Self::new(timestamp_from_millis(millis))
    }

    pub fn set(&self, at: Timestamp) {
        *self.now.lock() = at;
    }

    pub fn advance_millis(&self, millis: i64) {
        let mut now = self.now.lock();
        *now += Duration::milliseconds(millis);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock()
    }
}

/// Converts epoch milliseconds to a timestamp, saturating to the epoch on overflow.
pub fn timestamp_from_millis(millis: i64) -> Timestamp {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances_only_on_request() {
        let clock = ManualClock::at_millis(1_000);
        assert_eq!(clock.now().timestamp_millis(), 1_000);
        clock.advance_millis(250);
        assert_eq!(clock.now().timestamp_millis(), 1_250);
        clock.set(timestamp_from_millis(42));
        assert_eq!(clock.now().timestamp_millis(), 42);
    }

    #[test]
    fn system_clock_is_monotonic_enough() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }
}
