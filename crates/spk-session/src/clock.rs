//! Clock capability and exchange-timezone localization.
//!
//! The resolver in this crate is a pure function of "now in exchange-local
//! time". This module supplies that value: a [`Clock`] yields UTC instants,
//! and [`MarketTime`] converts them into the exchange's civil time. Nothing
//! outside this module reads the wall clock.

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use tracing::warn;

/// Environment variable overriding the exchange timezone (IANA name).
pub const MARKET_TZ_ENV: &str = "SPK_MARKET_TZ";

/// The exchange timezone used when no override is configured.
pub const DEFAULT_MARKET_TZ: Tz = chrono_tz::Asia::Seoul;

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of the current instant.
///
/// Production code uses [`SystemClock`]; tests use the fixed clock from
/// `spk-testkit`. Components never call `Utc::now()` directly.
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation of [`Clock`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ---------------------------------------------------------------------------
// MarketTime
// ---------------------------------------------------------------------------

/// Converts UTC instants into the exchange's civil (local) time.
///
/// The cutoff-hour rule and "today" are both defined in exchange-local time,
/// so every resolver call site localizes through this type first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketTime {
    tz: Tz,
}

impl MarketTime {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Read the timezone from `SPK_MARKET_TZ`, falling back to
    /// [`DEFAULT_MARKET_TZ`] when unset or unparseable. A bad value is a
    /// configuration mistake, not a fatal error; it is logged and ignored.
    pub fn from_env() -> Self {
        match std::env::var(MARKET_TZ_ENV) {
            Ok(raw) => match raw.parse::<Tz>() {
                Ok(tz) => Self { tz },
                Err(_) => {
                    warn!(value = %raw, "unparseable {MARKET_TZ_ENV}; using {DEFAULT_MARKET_TZ}");
                    Self {
                        tz: DEFAULT_MARKET_TZ,
                    }
                }
            },
            Err(_) => Self {
                tz: DEFAULT_MARKET_TZ,
            },
        }
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// Exchange-local civil time for a UTC instant.
    pub fn localize(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&self.tz).naive_local()
    }

    /// Convenience: localized "now" from a clock.
    pub fn local_now(&self, clock: &dyn Clock) -> NaiveDateTime {
        self.localize(clock.now_utc())
    }
}

impl Default for MarketTime {
    fn default() -> Self {
        Self {
            tz: DEFAULT_MARKET_TZ,
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
