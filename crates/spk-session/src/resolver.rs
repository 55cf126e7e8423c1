//! Trading-day resolution rules.
//!
//! Deterministic, pure logic. No IO, no wall-clock, no randomness.
//!
//! # Rules
//!
//! - A trading day is never a Saturday or Sunday, never after "today"
//!   (exchange-local), and never older than the rolling
//!   [`LOOKBACK_WINDOW_DAYS`] window.
//! - Before [`SUBMISSION_CUTOFF_HOUR`] the active session is still the
//!   previous business day's; from the cutoff onward it is today's.
//! - Correction is idempotent: a corrected date needs no further
//!   correction, so redirect chains terminate after one hop.
//!
//! Every call site passes `now` explicitly (see `clock::MarketTime`); the
//! same `now` always yields the same trading day regardless of whether the
//! caller is the edge guard or the client-side synchronizer.

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, Timelike, Weekday};
use spk_schemas::TradingDay;

/// Hour (exchange-local) at which the active session rolls over to today.
pub const SUBMISSION_CUTOFF_HOUR: u32 = 11;

/// Width of the rolling lookback window, in calendar days.
pub const LOOKBACK_WINDOW_DAYS: u64 = 30;

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Resolve the active trading day when no candidate date was supplied.
///
/// Before the cutoff hour the walk starts from yesterday, otherwise from
/// today; either start is then walked back to the nearest business day.
pub fn resolve(now_local: NaiveDateTime) -> TradingDay {
    let today = now_local.date();
    let start = if now_local.hour() < SUBMISSION_CUTOFF_HOUR {
        prev_day(today)
    } else {
        today
    };
    TradingDay(nearest_business_day(start))
}

/// Correct a candidate date against the resolution rules.
///
/// Returns `None` when the candidate is already a valid trading day, or
/// `Some(corrected)` otherwise. The corrected value is fully normalized:
/// feeding it back returns `None`.
///
/// Rules, in order:
/// 1. Candidate after today → clamp to today.
/// 2. Candidate older than `today - LOOKBACK_WINDOW_DAYS` → clamp to today.
/// 3. Weekend → nearest earlier business day.
///
/// A weekend walk-back near the window floor could land outside the window;
/// that case re-clamps to today so the result stays a fixpoint.
pub fn correct(candidate: NaiveDate, now_local: NaiveDateTime) -> Option<TradingDay> {
    let normalized = normalize(candidate, now_local.date());
    if normalized == candidate {
        None
    } else {
        Some(TradingDay(normalized))
    }
}

/// Parse a `yyyy-mm-dd` query-parameter candidate.
///
/// Unparseable input is treated as absent (the caller falls back to
/// [`resolve`]); there is no error path.
pub fn parse_candidate(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// Resolve a raw, optional `date` query parameter to the active trading day.
///
/// This is the one entry point shared by the query-state codec and the edge
/// guard: absent or unparseable → [`resolve`]; present → [`correct`]ed.
pub fn resolve_param(raw: Option<&str>, now_local: NaiveDateTime) -> TradingDay {
    match raw.and_then(parse_candidate) {
        None => resolve(now_local),
        Some(candidate) => correct(candidate, now_local).unwrap_or(TradingDay(candidate)),
    }
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

fn is_weekend(d: NaiveDate) -> bool {
    matches!(d.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Walk backward one day at a time while on a weekend. Terminates in ≤2 steps.
fn nearest_business_day(mut d: NaiveDate) -> NaiveDate {
    while is_weekend(d) {
        d = prev_day(d);
    }
    d
}

fn prev_day(d: NaiveDate) -> NaiveDate {
    d.pred_opt().unwrap_or(d)
}

/// Fixpoint normalization of a candidate against `today`.
fn normalize(candidate: NaiveDate, today: NaiveDate) -> NaiveDate {
    let floor = today
        .checked_sub_days(Days::new(LOOKBACK_WINDOW_DAYS))
        .unwrap_or(today);

    let clamped = if candidate > today || candidate < floor {
        today
    } else {
        candidate
    };

    let business = nearest_business_day(clamped);
    if business < floor {
        // Weekend walk-back at the window floor crossed it; today is always
        // inside the window after its own walk-back (≤2 days vs 30).
        nearest_business_day(today)
    } else {
        business
    }
}

// ---------------------------------------------------------------------------
// Unit tests (fixed dates; see also spk-testkit scenario suite)
// ---------------------------------------------------------------------------
