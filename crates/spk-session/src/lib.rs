//! Trading-session time rules for SignalPick.
//!
//! Two concerns live here, and nothing else:
//!
//! - [`clock`] — the `Clock` capability and exchange-timezone localization.
//!   Wall-clock reads happen **only** behind the [`clock::Clock`] trait so
//!   every consumer can be driven by a fixed clock in tests.
//! - [`resolver`] — the pure trading-day resolution rules (cutoff hour,
//!   weekend walk-back, lookback clamp). No IO, no wall-clock, no
//!   randomness; `now` is always an explicit argument.
//!
//! The resolver is the **single** implementation of the date rules. Both the
//! edge guard and the client-side query synchronizer call it, which is what
//! keeps the two execution contexts bit-for-bit in agreement.

pub mod clock;
pub mod resolver;

pub use clock::{Clock, MarketTime, SystemClock, DEFAULT_MARKET_TZ};
pub use resolver::{
    correct, parse_candidate, resolve, resolve_param, LOOKBACK_WINDOW_DAYS, SUBMISSION_CUTOFF_HOUR,
};
