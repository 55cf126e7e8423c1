//! Prediction submission flow for SignalPick.
//!
//! Layered from pure to effectful:
//!
//! - [`machine`] — the per-symbol submission state machine. Pure; every
//!   transition is an explicit event.
//! - [`guards`] — the ordered pre-submit checks and their refusal type.
//! - [`cancel`] — the 300-second cancel window with its two-click
//!   confirmation. Pure; `now` is always an argument.
//! - [`service`] — the server contract and error taxonomy.
//! - [`client`] — the reqwest implementation of the contract.
//! - [`controller`] — the async orchestrator tying all of the above to
//!   timers and UI events.
//!
//! Everything here is client-side. Settlement, slot accounting, and the
//! one-per-symbol rule are enforced by the server; this crate merely makes
//! the legal states unrepresentable locally and keeps the optimistic UI
//! honest when the server disagrees.

pub mod cancel;
pub mod client;
pub mod controller;
pub mod guards;
pub mod machine;
pub mod service;

pub use cancel::{CancelAction, CancelState, CancelWindow, ARM_CONFIRM_SECS, CANCEL_WINDOW_SECS};
pub use client::RestPredictionService;
pub use controller::{
    SessionView, SubmissionController, UiEvent, CONFIRMED_DISPLAY, FAILED_DISPLAY,
};
pub use guards::{check_submit, AuthGate, GuardInputs, SubmitRefusal};
pub use machine::{
    OptimisticShadow, PhaseTransitionError, SubmissionEvent, SubmissionMachine, SubmissionPhase,
};
pub use service::{PredictionService, ServiceError, SubmitRequest};
