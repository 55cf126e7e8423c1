//! Test support for the SignalPick crates.
//!
//! Deterministic stand-ins for every effectful seam the production code
//! hides behind a trait:
//!
//! - [`FixedClock`] — pinned, steppable time behind `spk_session::Clock`.
//! - [`RecordingSink`] — navigation sink that records every replace.
//! - [`StaticAuth`] / [`ScriptedPredictionService`] — auth flag and a
//!   prediction service with per-call scripted outcomes.
//!
//! The scenario tests under `tests/` exercise the crates together: the
//! debounced synchronizer, the submission single-flight rule, auth loss,
//! and the two-click cancel window.

pub mod clock;
pub mod nav;
pub mod predict;

pub use clock::FixedClock;
pub use nav::RecordingSink;
pub use predict::{ScriptedPredictionService, StaticAuth};
