//! Scenario: Submission is single-flight per symbol
//!
//! # Invariant under test
//!
//! Guards are evaluated under the same lock that moves a symbol's machine
//! out of `Idle`, so while one submit is in flight every further click on
//! that symbol is refused before anything leaves the client. Exactly one
//! server call is made per accepted click. Other symbols are independent;
//! an in-flight submit on one never blocks another.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, TimeZone, Utc};
use spk_predict::{SubmissionController, SubmitRefusal, UiEvent};
use spk_schemas::{Direction, Prediction, PredictionStatus, SessionPhase, TradingDay};
use spk_testkit::{FixedClock, ScriptedPredictionService, StaticAuth};
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn day() -> TradingDay {
    TradingDay(NaiveDate::from_ymd_opt(2024, 3, 6).unwrap())
}

fn pred(symbol: &str) -> Prediction {
    Prediction {
        id: format!("p-{symbol}"),
        symbol: symbol.to_owned(),
        choice: Direction::Up,
        status: PredictionStatus::Pending,
        submitted_at: Utc.with_ymd_and_hms(2024, 3, 6, 2, 0, 0).unwrap(),
        points_earned: None,
    }
}

fn controller(
    service: Arc<ScriptedPredictionService>,
) -> (SubmissionController, mpsc::UnboundedReceiver<UiEvent>) {
    SubmissionController::new(
        service,
        Arc::new(StaticAuth::new(true)),
        Arc::new(FixedClock::at_utc(2024, 3, 6, 2, 0, 0)),
        day(),
    )
}

// ---------------------------------------------------------------------------
// 1. A racing second click is refused; one server call total
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn racing_clicks_produce_exactly_one_server_call() {
    let service = Arc::new(ScriptedPredictionService::new(SessionPhase::Open, day(), 3));
    service.set_submit_delay(Duration::from_secs(1));
    service.push_submit(Ok(pred("AAPL")));
    let (ctl, _rx) = controller(service.clone());
    ctl.refresh().await.expect("refresh");

    let racing = ctl.clone();
    let first = tokio::spawn(async move { racing.submit("AAPL", Direction::Up).await });
    // Let the first submit reach the service await.
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    // The opposite choice on the same symbol is refused just the same.
    assert_eq!(
        ctl.submit("AAPL", Direction::Down).await,
        Err(SubmitRefusal::AlreadyPredicted)
    );

    tokio::time::sleep(Duration::from_secs(2)).await;
    first.await.expect("join").expect("first submit accepted");
    assert_eq!(service.submit_calls(), 1);
}

// ---------------------------------------------------------------------------
// 2. Other symbols are unaffected by an in-flight submit
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn other_symbols_submit_while_one_is_in_flight() {
    let service = Arc::new(ScriptedPredictionService::new(SessionPhase::Open, day(), 3));
    service.set_submit_delay(Duration::from_secs(1));
    service.push_submit(Ok(pred("AAPL")));
    service.push_submit(Ok(pred("MSFT")));
    let (ctl, _rx) = controller(service.clone());
    ctl.refresh().await.expect("refresh");

    let racing = ctl.clone();
    let first = tokio::spawn(async move { racing.submit("AAPL", Direction::Up).await });
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    ctl.submit("MSFT", Direction::Down)
        .await
        .expect("independent symbol accepted");

    first.await.expect("join").expect("first submit accepted");
    assert_eq!(service.submit_calls(), 2);
    let view = ctl.view();
    assert!(view.predictions.contains_key("AAPL"));
    assert!(view.predictions.contains_key("MSFT"));
}

// ---------------------------------------------------------------------------
// 3. A settled server-side prediction blocks both directions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn server_side_prediction_blocks_resubmission() {
    let service = Arc::new(ScriptedPredictionService::new(SessionPhase::Open, day(), 3));
    service.seed_prediction(pred("AAPL"));
    let (ctl, _rx) = controller(service.clone());
    ctl.refresh().await.expect("refresh");

    for choice in [Direction::Up, Direction::Down] {
        assert_eq!(
            ctl.submit("AAPL", choice).await,
            Err(SubmitRefusal::AlreadyPredicted)
        );
    }
    assert_eq!(service.submit_calls(), 0);
}
