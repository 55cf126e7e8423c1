//! Client-side query synchronizer.
//!
//! Owns the canonical [`QueryState`] behind a cloneable handle and mirrors
//! it into the address bar through a [`NavigationSink`]. All mutation goes
//! through patches; the synchronizer serializes after every commit and
//! calls [`NavigationSink::replace`] **only** when the canonical string
//! actually changed, so redundant updates never touch navigation.
//!
//! # Debounce
//!
//! There is exactly one pending cell: a staged [`QueryPatch`] plus one
//! timer. Each debounced call merges into the staged patch and
//! cancel-replaces the timer, so a typing burst commits once, with the
//! last-write-wins union of the burst (trailing edge). [`set_params`]
//! commits immediately and invalidates any pending timer.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use spk_session::{Clock, MarketTime};

use crate::codec;
use crate::state::{QueryPatch, QueryState};

/// Trailing-edge delay for [`QueryStateSync::set_params_debounced`].
pub const DEBOUNCE_DELAY: Duration = Duration::from_millis(400);

/// Replace-style navigation target (no history entry).
pub trait NavigationSink: Send + Sync {
    fn replace(&self, query: &str);
}

// ---------------------------------------------------------------------------
// QueryStateSync
// ---------------------------------------------------------------------------

/// Cloneable handle to the synchronized query state.
#[derive(Clone)]
pub struct QueryStateSync {
    inner: Arc<Inner>,
}

struct Inner {
    sink: Arc<dyn NavigationSink>,
    clock: Arc<dyn Clock>,
    market: MarketTime,
    delay: Duration,
    cell: Mutex<Cell>,
}

struct Cell {
    state: QueryState,
    last_query: String,
    staged: Option<QueryPatch>,
    timer: Option<JoinHandle<()>>,
    /// Bumped on every mutation entry point; a fired timer only commits if
    /// its stamp still matches, so a late wakeup cannot flush a newer burst.
    generation: u64,
}

impl QueryStateSync {
    /// Decode `raw_query` into the initial state and, when the canonical
    /// form differs from what arrived (missing date, junk params), push the
    /// canonical string through the sink once. This is the first-load
    /// defaulting pass.
    pub fn new(
        raw_query: &str,
        sink: Arc<dyn NavigationSink>,
        clock: Arc<dyn Clock>,
        market: MarketTime,
    ) -> Self {
        Self::with_delay(raw_query, sink, clock, market, DEBOUNCE_DELAY)
    }

    /// Same as [`new`](Self::new) with an explicit debounce delay.
    pub fn with_delay(
        raw_query: &str,
        sink: Arc<dyn NavigationSink>,
        clock: Arc<dyn Clock>,
        market: MarketTime,
        delay: Duration,
    ) -> Self {
        let now = market.local_now(clock.as_ref());
        let state = codec::parse(raw_query, now);
        let canonical = codec::serialize(&state);
        if canonical != raw_query.strip_prefix('?').unwrap_or(raw_query) {
            debug!(query = %canonical, "normalizing initial query");
            sink.replace(&canonical);
        }
        Self {
            inner: Arc::new(Inner {
                sink,
                clock,
                market,
                delay,
                cell: Mutex::new(Cell {
                    state,
                    last_query: canonical,
                    staged: None,
                    timer: None,
                    generation: 0,
                }),
            }),
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> QueryState {
        self.lock().state.clone()
    }

    /// Canonical query string as last pushed (or accepted) by the sink.
    pub fn query(&self) -> String {
        self.lock().last_query.clone()
    }

    /// Merge and commit immediately. Any staged debounced patch is folded
    /// in first so ordering is preserved, and its timer is invalidated.
    pub fn set_params(&self, patch: QueryPatch) {
        let mut cell = self.lock();
        cell.generation += 1;
        if let Some(timer) = cell.timer.take() {
            timer.abort();
        }
        stage(&mut cell, patch);
        self.commit(cell);
    }

    /// Merge into the pending cell and (re)start the trailing-edge timer.
    ///
    /// Must be called from within a tokio runtime. A zero delay behaves
    /// like [`set_params`].
    pub fn set_params_debounced(&self, patch: QueryPatch) {
        let mut cell = self.lock();
        cell.generation += 1;
        if let Some(timer) = cell.timer.take() {
            timer.abort();
        }
        stage(&mut cell, patch);
        if self.inner.delay.is_zero() {
            self.commit(cell);
            return;
        }
        let stamp = cell.generation;
        let this = self.clone();
        cell.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(this.inner.delay).await;
            this.flush_if_current(stamp);
        }));
    }

    fn flush_if_current(&self, stamp: u64) {
        let mut cell = self.lock();
        if cell.generation != stamp {
            return;
        }
        cell.timer = None;
        self.commit(cell);
    }

    /// Apply the staged patch and navigate if the canonical string moved.
    /// The sink runs outside the lock.
    fn commit(&self, mut cell: MutexGuard<'_, Cell>) {
        let Some(patch) = cell.staged.take() else {
            return;
        };
        let now = self.inner.market.local_now(self.inner.clock.as_ref());
        cell.state.apply(&patch, now);
        let query = codec::serialize(&cell.state);
        if query == cell.last_query {
            return;
        }
        cell.last_query = query.clone();
        drop(cell);
        debug!(query = %query, "query state changed; replacing");
        self.inner.sink.replace(&query);
    }

    fn lock(&self) -> MutexGuard<'_, Cell> {
        match self.inner.cell.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn stage(cell: &mut Cell, patch: QueryPatch) {
    match cell.staged.as_mut() {
        Some(staged) => staged.merge(patch),
        None => cell.staged = Some(patch),
    }
}

// ---------------------------------------------------------------------------
// Unit tests (paused-clock tokio; see also spk-testkit scenario suite)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::Mutex as StdMutex;

    use crate::state::Patch;

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now_utc(&self) -> DateTime<Utc> {
            self.0
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        calls: StdMutex<Vec<String>>,
    }

    impl RecordingSink {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl NavigationSink for RecordingSink {
        fn replace(&self, query: &str) {
            self.calls.lock().unwrap().push(query.to_owned());
        }
    }

    /// Wednesday 2024-03-06 12:00 KST.
    fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2024, 3, 6, 3, 0, 0).unwrap(),
        ))
    }

    fn sync_with(raw: &str, delay: Duration) -> (QueryStateSync, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let sync = QueryStateSync::with_delay(
            raw,
            sink.clone(),
            clock(),
            MarketTime::default(),
            delay,
        );
        (sync, sink)
    }

    fn q_patch(q: &str) -> QueryPatch {
        QueryPatch {
            q: Patch::Set(q.to_owned()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn first_load_normalizes_missing_date() {
        let (_sync, sink) = sync_with("", Duration::ZERO);
        assert_eq!(sink.calls(), vec!["date=2024-03-06".to_owned()]);
    }

    #[tokio::test]
    async fn canonical_initial_query_does_not_navigate() {
        let (_sync, sink) = sync_with("date=2024-03-06", Duration::ZERO);
        assert!(sink.calls().is_empty());
    }

    #[tokio::test]
    async fn immediate_set_params_navigates_once() {
        let (sync, sink) = sync_with("date=2024-03-06", Duration::ZERO);
        sync.set_params(q_patch("sam"));
        assert_eq!(sink.calls(), vec!["date=2024-03-06&q=sam".to_owned()]);
        assert_eq!(sync.state().q.as_deref(), Some("sam"));
    }

    #[tokio::test]
    async fn unchanged_commit_is_a_navigation_no_op() {
        let (sync, sink) = sync_with("date=2024-03-06&q=sam", Duration::ZERO);
        assert!(sink.calls().is_empty());
        sync.set_params(q_patch("sam"));
        assert!(sink.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn debounced_burst_commits_once_with_last_write() {
        let (sync, sink) = sync_with("date=2024-03-06", Duration::from_millis(400));
        for q in ["s", "sa", "sam"] {
            sync.set_params_debounced(q_patch(q));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        // Trailing edge has not elapsed since the last call yet.
        assert!(sink.calls().is_empty());
        tokio::time::sleep(Duration::from_millis(450)).await;
        assert_eq!(sink.calls(), vec!["date=2024-03-06&q=sam".to_owned()]);
    }

    #[tokio::test(start_paused = true)]
    async fn debounced_patches_merge_across_fields() {
        let (sync, sink) = sync_with("date=2024-03-06", Duration::from_millis(400));
        sync.set_params_debounced(q_patch("sam"));
        sync.set_params_debounced(QueryPatch {
            page: Patch::Set(2),
            ..Default::default()
        });
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(
            sink.calls(),
            vec!["date=2024-03-06&q=sam&page=2".to_owned()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_commit_cancels_pending_timer() {
        let (sync, sink) = sync_with("date=2024-03-06", Duration::from_millis(400));
        sync.set_params_debounced(q_patch("sa"));
        sync.set_params(q_patch("sam"));
        assert_eq!(sink.calls().len(), 1);
        tokio::time::sleep(Duration::from_millis(600)).await;
        // The aborted timer never fires a second navigation.
        assert_eq!(sink.calls(), vec!["date=2024-03-06&q=sam".to_owned()]);
    }
}
