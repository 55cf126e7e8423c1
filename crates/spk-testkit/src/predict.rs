//! Scriptable stand-ins for the submission flow's effectful seams.
//!
//! [`ScriptedPredictionService`] answers reads from settable fields and
//! pops submit/cancel outcomes from per-call scripts, so a scenario can
//! express "the first submit succeeds, the second hits a holiday" as two
//! pushes. An optional submit delay holds the call at its await point,
//! which is how the single-flight scenarios create an in-flight window.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use spk_predict::{AuthGate, PredictionService, ServiceError, SubmitRequest};
use spk_schemas::{Prediction, SessionPhase, SessionSnapshot, SlotSnapshot, TradingDay};

// ---------------------------------------------------------------------------
// StaticAuth
// ---------------------------------------------------------------------------

/// An [`AuthGate`] backed by a flag, togglable mid-scenario.
pub struct StaticAuth(AtomicBool);

impl StaticAuth {
    pub fn new(authenticated: bool) -> Self {
        Self(AtomicBool::new(authenticated))
    }

    pub fn set(&self, authenticated: bool) {
        self.0.store(authenticated, Ordering::SeqCst);
    }
}

impl AuthGate for StaticAuth {
    fn is_authenticated(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// ScriptedPredictionService
// ---------------------------------------------------------------------------

/// A [`PredictionService`] whose write outcomes are scripted per call.
pub struct ScriptedPredictionService {
    trading_day: TradingDay,
    phase: Mutex<SessionPhase>,
    slots: Mutex<u32>,
    predictions: Mutex<Vec<Prediction>>,
    submit_script: Mutex<VecDeque<Result<Prediction, ServiceError>>>,
    cancel_script: Mutex<VecDeque<Result<Prediction, ServiceError>>>,
    submit_delay: Mutex<Duration>,
    submit_calls: AtomicUsize,
    cancel_calls: AtomicUsize,
}

impl ScriptedPredictionService {
    pub fn new(phase: SessionPhase, trading_day: TradingDay, slots: u32) -> Self {
        Self {
            trading_day,
            phase: Mutex::new(phase),
            slots: Mutex::new(slots),
            predictions: Mutex::new(Vec::new()),
            submit_script: Mutex::new(VecDeque::new()),
            cancel_script: Mutex::new(VecDeque::new()),
            submit_delay: Mutex::new(Duration::ZERO),
            submit_calls: AtomicUsize::new(0),
            cancel_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_phase(&self, phase: SessionPhase) {
        *lock(&self.phase) = phase;
    }

    pub fn set_slots(&self, remaining: u32) {
        *lock(&self.slots) = remaining;
    }

    /// Seed a server-side prediction returned by `predictions_for_day`.
    pub fn seed_prediction(&self, prediction: Prediction) {
        lock(&self.predictions).push(prediction);
    }

    /// Queue the outcome of the next unscripted-so-far submit call.
    pub fn push_submit(&self, outcome: Result<Prediction, ServiceError>) {
        lock(&self.submit_script).push_back(outcome);
    }

    /// Queue the outcome of the next unscripted-so-far cancel call.
    pub fn push_cancel(&self, outcome: Result<Prediction, ServiceError>) {
        lock(&self.cancel_script).push_back(outcome);
    }

    /// Hold every submit call at its await point for `delay`.
    pub fn set_submit_delay(&self, delay: Duration) {
        *lock(&self.submit_delay) = delay;
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PredictionService for ScriptedPredictionService {
    async fn today_session(&self) -> Result<SessionSnapshot, ServiceError> {
        Ok(SessionSnapshot {
            phase: *lock(&self.phase),
            trading_day: self.trading_day,
        })
    }

    async fn remaining_slots(&self, _day: TradingDay) -> Result<SlotSnapshot, ServiceError> {
        Ok(SlotSnapshot {
            trading_day: self.trading_day,
            remaining: *lock(&self.slots),
        })
    }

    async fn predictions_for_day(&self, _day: TradingDay) -> Result<Vec<Prediction>, ServiceError> {
        Ok(lock(&self.predictions).clone())
    }

    async fn submit(&self, _req: &SubmitRequest) -> Result<Prediction, ServiceError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *lock(&self.submit_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        lock(&self.submit_script)
            .pop_front()
            .unwrap_or(Err(ServiceError::Transport("submit unscripted".into())))
    }

    async fn cancel(&self, _prediction_id: &str) -> Result<Prediction, ServiceError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.cancel_script)
            .pop_front()
            .unwrap_or(Err(ServiceError::Transport("cancel unscripted".into())))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
