//! Submission guards — the single choke-point in front of every submit.
//!
//! Four checks run in a fixed order, each with its own user-facing refusal.
//! The controller evaluates them against **live** state at click time (not
//! a captured snapshot), and an in-flight submission counts as an existing
//! prediction, which is what makes a double-click double-submit impossible.

use spk_schemas::{Prediction, SessionPhase};

// ---------------------------------------------------------------------------
// AuthGate
// ---------------------------------------------------------------------------

/// Evaluates whether the current user holds a live session.
///
/// Production wires this to the token store; tests use a bool stub.
pub trait AuthGate: Send + Sync {
    fn is_authenticated(&self) -> bool;
}

// ---------------------------------------------------------------------------
// SubmitRefusal
// ---------------------------------------------------------------------------

/// The reason a submission was refused before anything left the client.
///
/// Implements `std::error::Error` so it can be propagated through
/// `Box<dyn Error>` chains without extra wrapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitRefusal {
    /// No live session; the caller should route to login.
    NotAuthenticated,
    /// The trading session is not open for submissions.
    SessionClosed,
    /// No prediction slots remain for the active day.
    NoSlots,
    /// The symbol already has a prediction (server-side or in flight).
    AlreadyPredicted,
}

impl std::fmt::Display for SubmitRefusal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitRefusal::NotAuthenticated => {
                write!(f, "SUBMIT_REFUSED: not authenticated")
            }
            SubmitRefusal::SessionClosed => {
                write!(f, "SUBMIT_REFUSED: session closed for submissions")
            }
            SubmitRefusal::NoSlots => {
                write!(f, "SUBMIT_REFUSED: no prediction slots remaining")
            }
            SubmitRefusal::AlreadyPredicted => {
                write!(f, "SUBMIT_REFUSED: symbol already predicted today")
            }
        }
    }
}

impl std::error::Error for SubmitRefusal {}

// ---------------------------------------------------------------------------
// Guard evaluation
// ---------------------------------------------------------------------------

/// Live inputs for one guard evaluation, assembled by the controller at
/// click time.
#[derive(Debug, Clone, Copy)]
pub struct GuardInputs<'a> {
    pub authenticated: bool,
    pub phase: SessionPhase,
    pub remaining_slots: u32,
    /// The server-side prediction cached for this symbol, if any.
    pub existing: Option<&'a Prediction>,
    /// Whether this symbol's machine is anywhere but `Idle` (in flight or
    /// holding a display window).
    pub in_flight: bool,
}

/// Run the four submission guards in order; first failure wins.
///
/// An `Unknown` session phase refuses as closed: submission is only ever
/// allowed on a positively open session.
pub fn check_submit(inputs: &GuardInputs<'_>) -> Result<(), SubmitRefusal> {
    if !inputs.authenticated {
        return Err(SubmitRefusal::NotAuthenticated);
    }
    if inputs.phase != SessionPhase::Open {
        return Err(SubmitRefusal::SessionClosed);
    }
    if inputs.remaining_slots == 0 {
        return Err(SubmitRefusal::NoSlots);
    }
    let blocked = inputs
        .existing
        .map(Prediction::blocks_resubmission)
        .unwrap_or(false);
    if blocked || inputs.in_flight {
        return Err(SubmitRefusal::AlreadyPredicted);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
