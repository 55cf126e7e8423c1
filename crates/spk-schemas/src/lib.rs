//! Shared wire and domain types for the SignalPick prediction engine.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded at
//! the service boundary and decoded by tests. No business logic lives here;
//! date rules belong to `spk-session`, state transitions to `spk-predict`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// TradingDay
// ---------------------------------------------------------------------------

/// The business-day identifier under which predictions and signals are
/// grouped. ISO `yyyy-mm-dd` on the wire.
///
/// A `TradingDay` is only ever produced by the resolver in `spk-session`,
/// which guarantees it is a weekday, not in the future, and within the
/// rolling lookback window. Code that needs an unvalidated calendar date
/// should use `NaiveDate` directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradingDay(pub NaiveDate);

impl TradingDay {
    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl std::fmt::Display for TradingDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

// ---------------------------------------------------------------------------
// SessionPhase
// ---------------------------------------------------------------------------

/// Whether prediction submission is currently allowed for the active
/// trading day. Owned by the session service; consumed read-only.
///
/// `Unknown` covers both "not yet fetched" and any phase string a newer
/// server version may emit that this client does not recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionPhase {
    Open,
    Closed,
    Unknown,
}

// Hand-rolled so an unrecognized phase string degrades to `Unknown` instead
// of failing the whole response decode.
impl<'de> Deserialize<'de> for SessionPhase {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "OPEN" => SessionPhase::Open,
            "CLOSED" => SessionPhase::Closed,
            _ => SessionPhase::Unknown,
        })
    }
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// The directional choice of a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// The opposing choice. One prediction per symbol per day means this is
    /// disabled too once either side has been submitted.
    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }
}

// ---------------------------------------------------------------------------
// PredictionStatus
// ---------------------------------------------------------------------------

/// Server-side lifecycle status of a submitted prediction.
///
/// Settlement (`Correct` / `Incorrect`) is computed server-side; the client
/// only reads it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PredictionStatus {
    /// Submitted, session still open, cancellation window may apply.
    Pending,
    /// Settled in the user's favor.
    Correct,
    /// Settled against the user.
    Incorrect,
    /// Session closed; awaiting settlement. Not cancellable.
    Locked,
    /// Cancelled or invalidated; no points movement.
    Void,
}

// ---------------------------------------------------------------------------
// Prediction
// ---------------------------------------------------------------------------

/// A server-owned prediction record.
///
/// The client holds a read-through cache of these plus, transiently, one
/// optimistic shadow per in-flight submission (see `spk-predict`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub symbol: String,
    pub choice: Direction,
    pub status: PredictionStatus,
    pub submitted_at: DateTime<Utc>,
    pub points_earned: Option<i64>,
}

impl Prediction {
    /// A prediction blocks further submission for its symbol unless it has
    /// been cancelled/voided.
    pub fn blocks_resubmission(&self) -> bool {
        self.status != PredictionStatus::Void
    }
}

// ---------------------------------------------------------------------------
// Session / slot snapshots
// ---------------------------------------------------------------------------

/// Response of the session service's "today" endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub trading_day: TradingDay,
}

/// Remaining prediction slots for a trading day. Eventually-consistent;
/// always re-fetched, never derived locally.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlotSnapshot {
    pub trading_day: TradingDay,
    pub remaining: u32,
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trading_day_serializes_as_iso_string() {
        let d = TradingDay(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(serde_json::to_string(&d).unwrap(), "\"2024-03-01\"");
        assert_eq!(d.to_string(), "2024-03-01");
    }

    #[test]
    fn unknown_phase_string_maps_to_unknown() {
        let p: SessionPhase = serde_json::from_str("\"SETTLING\"").unwrap();
        assert_eq!(p, SessionPhase::Unknown);
        let p: SessionPhase = serde_json::from_str("\"OPEN\"").unwrap();
        assert_eq!(p, SessionPhase::Open);
    }

    #[test]
    fn void_prediction_does_not_block_resubmission() {
        let p = Prediction {
            id: "p1".into(),
            symbol: "AAPL".into(),
            choice: Direction::Up,
            status: PredictionStatus::Void,
            submitted_at: Utc::now(),
            points_earned: None,
        };
        assert!(!p.blocks_resubmission());
    }
}
