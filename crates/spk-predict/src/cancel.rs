//! Cancel window for a pending prediction.
//!
//! A prediction is cancellable for exactly [`CANCEL_WINDOW_SECS`] from its
//! `submitted_at`, and only while its status is `Pending`. The first click
//! arms a confirmation that auto-disarms after [`ARM_CONFIRM_SECS`]; a
//! second click while armed issues the cancel call. The countdown here is
//! advisory: the UI ticks it at 1 Hz and hides the control locally, but
//! the server remains the authority when the call is actually made.
//!
//! Pure logic; `now` is always an explicit argument.

use chrono::{DateTime, Utc};
use spk_schemas::{Prediction, PredictionStatus};

/// Seconds after submission during which a cancel may be issued.
pub const CANCEL_WINDOW_SECS: i64 = 300;

/// Seconds an armed confirmation stays armed before auto-disarming.
pub const ARM_CONFIRM_SECS: i64 = 3;

// ---------------------------------------------------------------------------
// States and actions
// ---------------------------------------------------------------------------

/// Observable state of the cancel control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelState {
    /// Cancellable; one click arms the confirmation.
    Ready { remaining_secs: i64 },
    /// First click received; the next click issues the cancel.
    Armed { remaining_secs: i64 },
    /// Window elapsed; the control disappears.
    Expired,
}

/// What a click did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelAction {
    /// First click: confirmation armed, nothing sent.
    Armed,
    /// Second click within the arm window: issue the cancel call now.
    Issue,
    /// Click landed outside the window; nothing to do.
    Ignored,
}

// ---------------------------------------------------------------------------
// CancelWindow
// ---------------------------------------------------------------------------

/// Tracks the window and the two-click confirmation for one prediction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelWindow {
    submitted_at: DateTime<Utc>,
    armed_at: Option<DateTime<Utc>>,
}

impl CancelWindow {
    /// A window exists only for a `Pending` prediction; anything settled,
    /// locked, or void has no cancel control at all.
    pub fn for_prediction(p: &Prediction) -> Option<Self> {
        (p.status == PredictionStatus::Pending).then(|| Self {
            submitted_at: p.submitted_at,
            armed_at: None,
        })
    }

    fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        CANCEL_WINDOW_SECS - (now - self.submitted_at).num_seconds()
    }

    fn is_armed(&self, now: DateTime<Utc>) -> bool {
        self.armed_at
            .is_some_and(|at| (now - at).num_seconds() < ARM_CONFIRM_SECS)
    }

    /// Current state without mutating anything.
    pub fn state(&self, now: DateTime<Utc>) -> CancelState {
        let remaining = self.remaining_secs(now);
        if remaining <= 0 {
            CancelState::Expired
        } else if self.is_armed(now) {
            CancelState::Armed {
                remaining_secs: remaining,
            }
        } else {
            CancelState::Ready {
                remaining_secs: remaining,
            }
        }
    }

    /// 1 Hz driver: drop a lapsed arm and report the fresh state.
    pub fn tick(&mut self, now: DateTime<Utc>) -> CancelState {
        if self.armed_at.is_some() && !self.is_armed(now) {
            self.armed_at = None;
        }
        self.state(now)
    }

    /// Handle a click on the cancel control.
    pub fn click(&mut self, now: DateTime<Utc>) -> CancelAction {
        if self.remaining_secs(now) <= 0 {
            return CancelAction::Ignored;
        }
        if self.is_armed(now) {
            self.armed_at = None;
            CancelAction::Issue
        } else {
            self.armed_at = Some(now);
            CancelAction::Armed
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
