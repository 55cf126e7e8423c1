//! Submission controller — orchestrates guards, machines, and the service.
//!
//! One controller owns the cached session view and a [`SubmissionMachine`]
//! per symbol. The submit flow is: evaluate guards against **live** state,
//! stage the optimistic shadow, dispatch, classify the outcome, and run
//! the display-window timers. Everything the UI needs to react to is
//! emitted as a [`UiEvent`] over an unbounded channel.
//!
//! # Invariants
//!
//! - Guards run under the same lock that moves the machine out of `Idle`,
//!   so two racing clicks can never both pass.
//! - `ServiceError::Auth` discards the shadow and returns to `Idle` with a
//!   login prompt; it never reaches the `Failed` display.
//! - `Confirmed` clears after [`CONFIRMED_DISPLAY`], `Failed` after
//!   [`FAILED_DISPLAY`]; no display state persists indefinitely.
//! - Slot counts are re-fetched after a confirm, never decremented locally.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, warn};

use spk_schemas::{Direction, Prediction, SessionPhase, TradingDay};
use spk_session::Clock;

use crate::guards::{check_submit, AuthGate, GuardInputs, SubmitRefusal};
use crate::machine::{SubmissionEvent, SubmissionMachine, SubmissionPhase};
use crate::service::{PredictionService, ServiceError, SubmitRequest};

/// How long a confirmed submission stays visible before returning to idle.
pub const CONFIRMED_DISPLAY: Duration = Duration::from_secs(2);

/// How long a failed submission stays visible before returning to idle.
pub const FAILED_DISPLAY: Duration = Duration::from_secs(3);

// ---------------------------------------------------------------------------
// View and events
// ---------------------------------------------------------------------------

/// Read-through cache of the server's session state.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub phase: SessionPhase,
    pub trading_day: TradingDay,
    pub remaining_slots: u32,
    /// Server-side predictions for the active day, keyed by symbol.
    pub predictions: HashMap<String, Prediction>,
}

impl SessionView {
    fn empty(trading_day: TradingDay) -> Self {
        Self {
            phase: SessionPhase::Unknown,
            trading_day,
            remaining_slots: 0,
            predictions: HashMap::new(),
        }
    }
}

/// Everything the UI reacts to, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    /// Optimistic shadow staged; render the choice as selected.
    ShadowSet { symbol: String, choice: Direction },
    /// Shadow discarded or superseded; fall back to server state.
    ShadowCleared { symbol: String },
    /// Server accepted the prediction.
    Confirmed { prediction: Prediction },
    /// Submission failed; show the message for the failure window.
    FailureNotice { symbol: String, message: String },
    /// Session is gone; route to login.
    LoginRequired,
    /// A guard refused the submission before anything left the client.
    Refused {
        symbol: String,
        refusal: SubmitRefusal,
    },
}

// ---------------------------------------------------------------------------
// SubmissionController
// ---------------------------------------------------------------------------

struct ControllerState {
    view: SessionView,
    machines: HashMap<String, SubmissionMachine>,
}

/// Cloneable handle; all clones share the same view and machines.
#[derive(Clone)]
pub struct SubmissionController {
    service: Arc<dyn PredictionService>,
    auth: Arc<dyn AuthGate>,
    clock: Arc<dyn Clock>,
    events: mpsc::UnboundedSender<UiEvent>,
    shared: Arc<Mutex<ControllerState>>,
}

impl SubmissionController {
    /// Build a controller and the event stream the UI consumes.
    pub fn new(
        service: Arc<dyn PredictionService>,
        auth: Arc<dyn AuthGate>,
        clock: Arc<dyn Clock>,
        trading_day: TradingDay,
    ) -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let controller = Self {
            service,
            auth,
            clock,
            events,
            shared: Arc::new(Mutex::new(ControllerState {
                view: SessionView::empty(trading_day),
                machines: HashMap::new(),
            })),
        };
        (controller, rx)
    }

    /// Re-fetch session phase, slots, and predictions from the server.
    pub async fn refresh(&self) -> Result<(), ServiceError> {
        let snapshot = self.service.today_session().await?;
        let slots = self.service.remaining_slots(snapshot.trading_day).await?;
        let predictions = self
            .service
            .predictions_for_day(snapshot.trading_day)
            .await?;

        let mut st = self.lock();
        st.view.phase = snapshot.phase;
        st.view.trading_day = snapshot.trading_day;
        st.view.remaining_slots = slots.remaining;
        st.view.predictions = predictions
            .into_iter()
            .map(|p| (p.symbol.clone(), p))
            .collect();
        Ok(())
    }

    /// Snapshot of the cached session view.
    pub fn view(&self) -> SessionView {
        self.lock().view.clone()
    }

    /// Current phase for a symbol (`Idle` when no machine exists yet).
    pub fn phase_of(&self, symbol: &str) -> SubmissionPhase {
        self.lock()
            .machines
            .get(symbol)
            .map(|m| m.phase)
            .unwrap_or(SubmissionPhase::Idle)
    }

    /// Submit a prediction for `symbol`.
    ///
    /// Returns the guard refusal when nothing left the client; service
    /// outcomes (confirm, failure, auth loss) are reported as [`UiEvent`]s.
    pub async fn submit(&self, symbol: &str, choice: Direction) -> Result<(), SubmitRefusal> {
        let trading_day = self.begin(symbol, choice)?;
        self.emit(UiEvent::ShadowSet {
            symbol: symbol.to_owned(),
            choice,
        });

        let req = SubmitRequest {
            trading_day,
            symbol: symbol.to_owned(),
            choice,
        };
        match self.service.submit(&req).await {
            Ok(prediction) => self.on_confirmed(symbol, prediction).await,
            Err(ServiceError::Auth) => {
                self.apply(symbol, &SubmissionEvent::Abort);
                self.emit(UiEvent::ShadowCleared {
                    symbol: symbol.to_owned(),
                });
                self.emit(UiEvent::LoginRequired);
            }
            Err(ServiceError::Validation(message)) => self.on_failed(symbol, message),
            Err(ServiceError::Transport(message)) => {
                warn!(symbol, %message, "prediction submit transport failure");
                self.on_failed(symbol, message);
            }
        }
        Ok(())
    }

    /// Guard evaluation and the `Idle → Confirming` move, under one lock.
    fn begin(&self, symbol: &str, choice: Direction) -> Result<TradingDay, SubmitRefusal> {
        let now = self.clock.now_utc();
        let mut st = self.lock();
        let busy = st
            .machines
            .get(symbol)
            .map(|m| m.phase != SubmissionPhase::Idle)
            .unwrap_or(false);
        let inputs = GuardInputs {
            authenticated: self.auth.is_authenticated(),
            phase: st.view.phase,
            remaining_slots: st.view.remaining_slots,
            existing: st.view.predictions.get(symbol),
            in_flight: busy,
        };
        if let Err(refusal) = check_submit(&inputs) {
            self.emit(UiEvent::Refused {
                symbol: symbol.to_owned(),
                refusal: refusal.clone(),
            });
            if refusal == SubmitRefusal::NotAuthenticated {
                self.emit(UiEvent::LoginRequired);
            }
            return Err(refusal);
        }

        let trading_day = st.view.trading_day;
        let machine = st
            .machines
            .entry(symbol.to_owned())
            .or_insert_with(|| SubmissionMachine::new(symbol));
        // The guards held the machine at Idle; a transition error here is a
        // wiring bug, reported loudly and treated as a busy symbol.
        for event in [SubmissionEvent::Begin { choice, at: now }, SubmissionEvent::Dispatch] {
            if let Err(err) = machine.apply(&event) {
                error!(symbol, %err, "submission machine out of sync");
                return Err(SubmitRefusal::AlreadyPredicted);
            }
        }
        Ok(trading_day)
    }

    async fn on_confirmed(&self, symbol: &str, prediction: Prediction) {
        {
            let mut st = self.lock();
            if let Some(machine) = st.machines.get_mut(symbol) {
                if let Err(err) = machine.apply(&SubmissionEvent::ConfirmOk) {
                    error!(symbol, %err, "submission machine out of sync");
                }
            }
            st.view
                .predictions
                .insert(symbol.to_owned(), prediction.clone());
        }
        self.emit(UiEvent::ShadowCleared {
            symbol: symbol.to_owned(),
        });
        self.emit(UiEvent::Confirmed {
            prediction: prediction.clone(),
        });
        self.schedule_display_elapsed(symbol, CONFIRMED_DISPLAY);

        // Slots are eventually consistent; re-fetch rather than decrement.
        let day = self.lock().view.trading_day;
        match self.service.remaining_slots(day).await {
            Ok(slots) => self.lock().view.remaining_slots = slots.remaining,
            Err(err) => warn!(%err, "slot re-fetch after confirm failed"),
        }
    }

    fn on_failed(&self, symbol: &str, message: String) {
        self.apply(symbol, &SubmissionEvent::ConfirmErr);
        self.emit(UiEvent::ShadowCleared {
            symbol: symbol.to_owned(),
        });
        self.emit(UiEvent::FailureNotice {
            symbol: symbol.to_owned(),
            message,
        });
        self.schedule_display_elapsed(symbol, FAILED_DISPLAY);
    }

    fn schedule_display_elapsed(&self, symbol: &str, after: Duration) {
        let this = self.clone();
        let symbol = symbol.to_owned();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            this.apply(&symbol, &SubmissionEvent::DisplayElapsed);
        });
    }

    fn apply(&self, symbol: &str, event: &SubmissionEvent) {
        let mut st = self.lock();
        if let Some(machine) = st.machines.get_mut(symbol) {
            if let Err(err) = machine.apply(event) {
                error!(symbol, %err, "submission machine out of sync");
            }
        }
    }

    fn emit(&self, event: UiEvent) {
        // The receiver lives as long as the UI; a drop only happens during
        // teardown, when losing events is fine.
        let _ = self.events.send(event);
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        match self.shared.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests (paused-clock tokio; see also spk-testkit scenario suite)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use spk_schemas::{PredictionStatus, SessionSnapshot, SlotSnapshot, TradingDay};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now_utc(&self) -> DateTime<Utc> {
            self.0
        }
    }

    struct StaticAuth(bool);

    impl AuthGate for StaticAuth {
        fn is_authenticated(&self) -> bool {
            self.0
        }
    }

    struct ScriptedService {
        phase: SessionPhase,
        slots: u32,
        submit_outcomes: Mutex<VecDeque<Result<Prediction, ServiceError>>>,
        submit_delay: Duration,
        submit_calls: AtomicUsize,
    }

    impl ScriptedService {
        fn new(phase: SessionPhase, slots: u32) -> Self {
            Self {
                phase,
                slots,
                submit_outcomes: Mutex::new(VecDeque::new()),
                submit_delay: Duration::ZERO,
                submit_calls: AtomicUsize::new(0),
            }
        }

        fn push_submit(&self, outcome: Result<Prediction, ServiceError>) {
            self.submit_outcomes.lock().unwrap().push_back(outcome);
        }
    }

    #[async_trait]
    impl PredictionService for ScriptedService {
        async fn today_session(&self) -> Result<SessionSnapshot, ServiceError> {
            Ok(SessionSnapshot {
                phase: self.phase,
                trading_day: day(),
            })
        }

        async fn remaining_slots(&self, _day: TradingDay) -> Result<SlotSnapshot, ServiceError> {
            Ok(SlotSnapshot {
                trading_day: day(),
                remaining: self.slots,
            })
        }

        async fn predictions_for_day(
            &self,
            _day: TradingDay,
        ) -> Result<Vec<Prediction>, ServiceError> {
            Ok(Vec::new())
        }

        async fn submit(&self, _req: &SubmitRequest) -> Result<Prediction, ServiceError> {
            self.submit_calls.fetch_add(1, Ordering::SeqCst);
            if !self.submit_delay.is_zero() {
                tokio::time::sleep(self.submit_delay).await;
            }
            self.submit_outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ServiceError::Transport("unscripted".into())))
        }

        async fn cancel(&self, _prediction_id: &str) -> Result<Prediction, ServiceError> {
            Err(ServiceError::Transport("unscripted".into()))
        }
    }

    fn day() -> TradingDay {
        TradingDay(chrono::NaiveDate::from_ymd_opt(2024, 3, 6).unwrap())
    }

    fn pred() -> Prediction {
        Prediction {
            id: "p-1".into(),
            symbol: "AAPL".into(),
            choice: Direction::Up,
            status: PredictionStatus::Pending,
            submitted_at: Utc.with_ymd_and_hms(2024, 3, 6, 2, 0, 0).unwrap(),
            points_earned: None,
        }
    }

    fn controller(
        service: Arc<ScriptedService>,
        authed: bool,
    ) -> (SubmissionController, mpsc::UnboundedReceiver<UiEvent>) {
        SubmissionController::new(
            service,
            Arc::new(StaticAuth(authed)),
            Arc::new(FixedClock(
                Utc.with_ymd_and_hms(2024, 3, 6, 2, 0, 0).unwrap(),
            )),
            day(),
        )
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<UiEvent>) -> Vec<UiEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    #[tokio::test]
    async fn closed_session_refuses_without_a_service_call() {
        let service = Arc::new(ScriptedService::new(SessionPhase::Closed, 3));
        let (ctl, mut rx) = controller(service.clone(), true);
        ctl.refresh().await.unwrap();

        let got = ctl.submit("AAPL", Direction::Up).await;
        assert_eq!(got, Err(SubmitRefusal::SessionClosed));
        assert_eq!(service.submit_calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            drain(&mut rx),
            vec![UiEvent::Refused {
                symbol: "AAPL".into(),
                refusal: SubmitRefusal::SessionClosed,
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn confirmed_flow_emits_events_and_clears_after_display() {
        let service = Arc::new(ScriptedService::new(SessionPhase::Open, 3));
        service.push_submit(Ok(pred()));
        let (ctl, mut rx) = controller(service, true);
        ctl.refresh().await.unwrap();

        ctl.submit("AAPL", Direction::Up).await.unwrap();
        assert_eq!(ctl.phase_of("AAPL"), SubmissionPhase::Confirmed);
        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![
                UiEvent::ShadowSet {
                    symbol: "AAPL".into(),
                    choice: Direction::Up,
                },
                UiEvent::ShadowCleared {
                    symbol: "AAPL".into(),
                },
                UiEvent::Confirmed { prediction: pred() },
            ]
        );
        assert!(ctl.view().predictions.contains_key("AAPL"));

        tokio::time::sleep(CONFIRMED_DISPLAY + Duration::from_millis(50)).await;
        assert_eq!(ctl.phase_of("AAPL"), SubmissionPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn second_click_while_in_flight_is_refused() {
        let mut service = ScriptedService::new(SessionPhase::Open, 3);
        service.submit_delay = Duration::from_secs(1);
        service.push_submit(Ok(pred()));
        let service = Arc::new(service);
        let (ctl, _rx) = controller(service.clone(), true);
        ctl.refresh().await.unwrap();

        let racing = ctl.clone();
        let first = tokio::spawn(async move { racing.submit("AAPL", Direction::Up).await });
        // Let the first submit reach the service await.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(
            ctl.submit("AAPL", Direction::Down).await,
            Err(SubmitRefusal::AlreadyPredicted)
        );

        tokio::time::sleep(Duration::from_secs(2)).await;
        first.await.unwrap().unwrap();
        assert_eq!(service.submit_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn auth_error_returns_to_idle_with_login_prompt() {
        let service = Arc::new(ScriptedService::new(SessionPhase::Open, 3));
        service.push_submit(Err(ServiceError::Auth));
        let (ctl, mut rx) = controller(service, true);
        ctl.refresh().await.unwrap();

        ctl.submit("AAPL", Direction::Up).await.unwrap();
        // Straight back to Idle: the failure display is skipped entirely.
        assert_eq!(ctl.phase_of("AAPL"), SubmissionPhase::Idle);
        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![
                UiEvent::ShadowSet {
                    symbol: "AAPL".into(),
                    choice: Direction::Up,
                },
                UiEvent::ShadowCleared {
                    symbol: "AAPL".into(),
                },
                UiEvent::LoginRequired,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn validation_error_shows_failure_then_clears() {
        let service = Arc::new(ScriptedService::new(SessionPhase::Open, 3));
        service.push_submit(Err(ServiceError::Validation("market holiday".into())));
        let (ctl, mut rx) = controller(service, true);
        ctl.refresh().await.unwrap();

        ctl.submit("AAPL", Direction::Up).await.unwrap();
        assert_eq!(ctl.phase_of("AAPL"), SubmissionPhase::Failed);
        let events = drain(&mut rx);
        assert!(events.contains(&UiEvent::FailureNotice {
            symbol: "AAPL".into(),
            message: "market holiday".into(),
        }));

        tokio::time::sleep(FAILED_DISPLAY + Duration::from_millis(50)).await;
        assert_eq!(ctl.phase_of("AAPL"), SubmissionPhase::Idle);
    }

    #[tokio::test]
    async fn unauthenticated_submit_prompts_login() {
        let service = Arc::new(ScriptedService::new(SessionPhase::Open, 3));
        let (ctl, mut rx) = controller(service.clone(), false);
        ctl.refresh().await.unwrap();

        assert_eq!(
            ctl.submit("AAPL", Direction::Up).await,
            Err(SubmitRefusal::NotAuthenticated)
        );
        assert_eq!(service.submit_calls.load(Ordering::SeqCst), 0);
        let events = drain(&mut rx);
        assert!(events.contains(&UiEvent::LoginRequired));
    }

    #[tokio::test]
    async fn existing_prediction_blocks_the_opposite_choice_too() {
        let service = Arc::new(ScriptedService::new(SessionPhase::Open, 3));
        service.push_submit(Ok(pred()));
        let (ctl, _rx) = controller(service, true);
        ctl.refresh().await.unwrap();

        ctl.submit("AAPL", Direction::Up).await.unwrap();
        assert_eq!(
            ctl.submit("AAPL", Direction::Down).await,
            Err(SubmitRefusal::AlreadyPredicted)
        );
    }
}
