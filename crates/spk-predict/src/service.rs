//! Service boundary for prediction operations.
//!
//! This module defines **only** the request/error types and the service
//! trait. The REST implementation lives in `client`; tests use the
//! scriptable stub from `spk-testkit`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use spk_schemas::{Direction, Prediction, SessionSnapshot, SlotSnapshot, TradingDay};
use std::fmt;

// ---------------------------------------------------------------------------
// SubmitRequest
// ---------------------------------------------------------------------------

/// Body of a prediction submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequest {
    #[serde(rename = "date")]
    pub trading_day: TradingDay,
    pub symbol: String,
    pub choice: Direction,
}

// ---------------------------------------------------------------------------
// ServiceError
// ---------------------------------------------------------------------------

/// Errors a [`PredictionService`] call may return, split by how the
/// submission flow must react.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// 401/403: the session is gone. Discard the shadow, return to idle,
    /// and route to login. Never shown as a submission failure.
    Auth,
    /// Business rejection with a user-facing message. No retry.
    Validation(String),
    /// Network or server failure. Shown as a failure; no automatic retry.
    Transport(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Auth => write!(f, "authentication required"),
            ServiceError::Validation(msg) => write!(f, "rejected: {msg}"),
            ServiceError::Transport(msg) => write!(f, "transport error: {msg}"),
        }
    }
}

impl std::error::Error for ServiceError {}

// ---------------------------------------------------------------------------
// PredictionService
// ---------------------------------------------------------------------------

/// Server contract for sessions, slots, and predictions.
///
/// Slot counts and session phase are eventually-consistent reads: callers
/// re-fetch them and never derive them locally.
#[async_trait]
pub trait PredictionService: Send + Sync {
    /// Phase and trading day of the active session.
    async fn today_session(&self) -> Result<SessionSnapshot, ServiceError>;

    /// Remaining prediction slots for a trading day.
    async fn remaining_slots(&self, day: TradingDay) -> Result<SlotSnapshot, ServiceError>;

    /// All of the user's predictions for a trading day.
    async fn predictions_for_day(&self, day: TradingDay) -> Result<Vec<Prediction>, ServiceError>;

    /// Submit a prediction. The returned record supersedes any optimistic
    /// shadow the client staged.
    async fn submit(&self, req: &SubmitRequest) -> Result<Prediction, ServiceError>;

    /// Cancel a pending prediction. The server is authoritative; the local
    /// countdown is advisory only.
    async fn cancel(&self, prediction_id: &str) -> Result<Prediction, ServiceError>;
}
