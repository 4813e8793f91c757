//! Time sources for the driver.
//!
//! `idle_core` never reads a clock; the driver does, through [`Clock`], so
//! scripted and batch runs can swap the wall clock for a manual one.

use std::time::{SystemTime, UNIX_EPOCH};

use idle_core::state::Timestamp;

/// A source of the current instant.
pub trait Clock {
    /// The current instant.
    fn now(&self) -> Timestamp;
}

/// Wall clock, milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
        Timestamp::from_millis(millis)
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualClock {
    now: Timestamp,
}

impl ManualClock {
    /// Clock stopped at `start`.
    #[must_use]
    pub fn starting_at(start: Timestamp) -> Self {
        Self { now: start }
    }

    /// Move forward by whole milliseconds.
    pub fn advance_millis(&mut self, millis: u64) {
        self.now = Timestamp::from_millis(self.now.as_millis().saturating_add(millis));
    }

    /// Move forward by seconds, rounded to the millisecond.
    pub fn advance_secs(&mut self, seconds: f64) {
        self.now = self.now.advanced_by_secs(seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now
    }
}
