//! Fixed, steppable clock.
//!
//! Production code reads time through the `Clock` trait only, so pinning
//! this one type makes every date rule, window, and timer deterministic.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, TimeZone, Utc};
use spk_session::Clock;

/// A [`Clock`] that returns a pinned instant until told otherwise.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Pin the clock to a UTC civil time. Panics on an invalid date, which
    /// is the right failure mode for a test fixture.
    pub fn at_utc(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Self::new(
            Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
                .single()
                .expect("valid UTC civil time"),
        )
    }

    /// Step the clock forward (or backward with a negative delta).
    pub fn advance(&self, delta: Duration) {
        *self.lock() += delta;
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.lock() = instant;
    }

    fn lock(&self) -> MutexGuard<'_, DateTime<Utc>> {
        self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.lock()
    }
}
