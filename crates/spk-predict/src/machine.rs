//! Submission state machine for one symbol.
//!
//! # Design
//!
//! Explicit state machine for a single prediction submission. Every
//! lifecycle event is applied via [`SubmissionMachine::apply`], which
//! enforces legal transitions only; illegal events return
//! [`PhaseTransitionError`] so a wiring mistake in the controller surfaces
//! immediately instead of leaving a symbol stuck.
//!
//! # State diagram
//!
//! ```text
//!            Begin            Dispatch           ConfirmOk
//!   Idle ──────────► Optimistic ──────► Confirming ──────► Confirmed
//!    ▲                   │                  │    │             │
//!    │                   │ Abort            │    │ ConfirmErr  │ DisplayElapsed
//!    │◄──────────────────┴──────────────────┘    ▼             ▼
//!    │                                        Failed ───────► Idle
//!    └────────────────────── DisplayElapsed ────┘
//! ```
//!
//! `Abort` is the auth-failure path: the optimistic shadow is discarded and
//! the symbol returns straight to `Idle` with no failure display. The
//! `Confirmed` and `Failed` states are display windows; the controller's
//! timers emit `DisplayElapsed` so neither persists indefinitely.

use chrono::{DateTime, Utc};
use spk_schemas::Direction;

// ---------------------------------------------------------------------------
// SubmissionPhase
// ---------------------------------------------------------------------------

/// All states one symbol's submission flow can occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmissionPhase {
    /// No submission in progress.
    Idle,
    /// Guards passed; optimistic shadow is visible, request not yet sent.
    Optimistic,
    /// Request is on the wire; awaiting the server's verdict.
    Confirming,
    /// Server accepted. Display window, then back to `Idle`.
    Confirmed,
    /// Submission failed (validation or transport). Display window, then
    /// back to `Idle`.
    Failed,
}

impl SubmissionPhase {
    /// `true` while a submission is between guard pass and server verdict.
    /// An in-flight symbol counts as already predicted for guard purposes.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Optimistic | Self::Confirming)
    }
}

// ---------------------------------------------------------------------------
// SubmissionEvent
// ---------------------------------------------------------------------------

/// Events that drive transitions in a [`SubmissionMachine`].
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionEvent {
    /// Guards passed; stage the optimistic shadow.
    Begin { choice: Direction, at: DateTime<Utc> },
    /// The submit request was handed to the transport.
    Dispatch,
    /// Server confirmed the prediction.
    ConfirmOk,
    /// Server or transport rejected the submission.
    ConfirmErr,
    /// Auth failure or guard reversal: discard the shadow, skip the
    /// failure display, return to `Idle`.
    Abort,
    /// A display window (`Confirmed` / `Failed`) ran out.
    DisplayElapsed,
}

// ---------------------------------------------------------------------------
// PhaseTransitionError
// ---------------------------------------------------------------------------

/// Returned when an event cannot legally be applied in the current phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTransitionError {
    /// The phase the machine was in when the illegal event arrived.
    pub from: SubmissionPhase,
    /// Debug string of the event that was rejected.
    pub event: String,
}

impl std::fmt::Display for PhaseTransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "illegal submission transition: {:?} + {}",
            self.from, self.event
        )
    }
}

impl std::error::Error for PhaseTransitionError {}

// ---------------------------------------------------------------------------
// OptimisticShadow
// ---------------------------------------------------------------------------

/// The locally staged prediction shown while the server round-trip is in
/// flight. Replaced by the server record on confirm, rolled back on any
/// failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimisticShadow {
    pub symbol: String,
    pub choice: Direction,
    pub staged_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// SubmissionMachine
// ---------------------------------------------------------------------------

/// Per-symbol submission flow tracked through an explicit state machine.
#[derive(Debug, Clone)]
pub struct SubmissionMachine {
    pub symbol: String,
    pub phase: SubmissionPhase,
    shadow: Option<OptimisticShadow>,
}

impl SubmissionMachine {
    /// Create a machine at `Idle` for a symbol.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            phase: SubmissionPhase::Idle,
            shadow: None,
        }
    }

    /// The staged shadow, present only between `Begin` and the verdict.
    pub fn shadow(&self) -> Option<&OptimisticShadow> {
        self.shadow.as_ref()
    }

    /// Apply an event to this machine.
    ///
    /// # Errors
    /// Returns [`PhaseTransitionError`] for illegal transitions.
    pub fn apply(&mut self, event: &SubmissionEvent) -> Result<(), PhaseTransitionError> {
        use SubmissionEvent::*;
        use SubmissionPhase::*;

        match (&self.phase, event) {
            (Idle, Begin { choice, at }) => {
                self.shadow = Some(OptimisticShadow {
                    symbol: self.symbol.clone(),
                    choice: *choice,
                    staged_at: *at,
                });
                self.phase = Optimistic;
            }

            (Optimistic, Dispatch) => self.phase = Confirming,

            (Confirming, ConfirmOk) => {
                // The server record supersedes the shadow.
                self.shadow = None;
                self.phase = Confirmed;
            }

            (Confirming, ConfirmErr) => {
                self.shadow = None;
                self.phase = Failed;
            }

            // Auth path: no failure display, straight back to Idle.
            (Optimistic | Confirming, Abort) => {
                self.shadow = None;
                self.phase = Idle;
            }

            (Confirmed | Failed, DisplayElapsed) => self.phase = Idle,

            // A timer that fires after the machine was already reset is
            // harmless; swallow it.
            (Idle, DisplayElapsed) => {}

            (from, event) => {
                return Err(PhaseTransitionError {
                    from: *from,
                    event: format!("{event:?}"),
                });
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn begin() -> SubmissionEvent {
        SubmissionEvent::Begin {
            choice: Direction::Up,
            at: Utc::now(),
        }
    }

    #[test]
    fn happy_path_confirm_then_idle() {
        let mut m = SubmissionMachine::new("AAPL");
        m.apply(&begin()).unwrap();
        assert_eq!(m.phase, SubmissionPhase::Optimistic);
        assert_eq!(m.shadow().unwrap().choice, Direction::Up);

        m.apply(&SubmissionEvent::Dispatch).unwrap();
        assert!(m.phase.is_in_flight());

        m.apply(&SubmissionEvent::ConfirmOk).unwrap();
        assert_eq!(m.phase, SubmissionPhase::Confirmed);
        assert!(m.shadow().is_none());

        m.apply(&SubmissionEvent::DisplayElapsed).unwrap();
        assert_eq!(m.phase, SubmissionPhase::Idle);
    }

    #[test]
    fn failure_path_rolls_back_shadow() {
        let mut m = SubmissionMachine::new("AAPL");
        m.apply(&begin()).unwrap();
        m.apply(&SubmissionEvent::Dispatch).unwrap();
        m.apply(&SubmissionEvent::ConfirmErr).unwrap();
        assert_eq!(m.phase, SubmissionPhase::Failed);
        assert!(m.shadow().is_none());
        m.apply(&SubmissionEvent::DisplayElapsed).unwrap();
        assert_eq!(m.phase, SubmissionPhase::Idle);
    }

    #[test]
    fn abort_skips_failure_display() {
        let mut m = SubmissionMachine::new("AAPL");
        m.apply(&begin()).unwrap();
        m.apply(&SubmissionEvent::Dispatch).unwrap();
        m.apply(&SubmissionEvent::Abort).unwrap();
        assert_eq!(m.phase, SubmissionPhase::Idle);
        assert!(m.shadow().is_none());
    }

    #[test]
    fn begin_while_in_flight_is_illegal() {
        let mut m = SubmissionMachine::new("AAPL");
        m.apply(&begin()).unwrap();
        let err = m.apply(&begin()).unwrap_err();
        assert_eq!(err.from, SubmissionPhase::Optimistic);
    }

    #[test]
    fn confirm_without_dispatch_is_illegal() {
        let mut m = SubmissionMachine::new("AAPL");
        m.apply(&begin()).unwrap();
        assert!(m.apply(&SubmissionEvent::ConfirmOk).is_err());
    }

    #[test]
    fn late_display_timer_on_idle_is_a_no_op() {
        let mut m = SubmissionMachine::new("AAPL");
        m.apply(&SubmissionEvent::DisplayElapsed).unwrap();
        assert_eq!(m.phase, SubmissionPhase::Idle);
    }
}
