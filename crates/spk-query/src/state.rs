//! Canonical query state and partial-update patches.
//!
//! `QueryState` is the single source of truth for the signals list view:
//! active trading day, filters, and pagination. It only changes through
//! [`QueryPatch`] merges, and every merge re-establishes the structural
//! invariant before the state is observable again.
//!
//! # Invariants
//!
//! - `models` contains no duplicates (first occurrence wins).
//! - `conditions.len() == max(0, models.len() - 1)`: one joiner between
//!   each adjacent pair of selected models. Repair truncates or pads with
//!   the first existing joiner (default [`Joiner::Or`]).
//! - `date` is always a resolver-produced [`TradingDay`].

use chrono::{NaiveDate, NaiveDateTime};
use spk_schemas::TradingDay;
use spk_session::resolver;

/// Page size used when the query string carries none.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

// ---------------------------------------------------------------------------
// Joiner
// ---------------------------------------------------------------------------

/// Boolean connective between two adjacent model filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Joiner {
    #[default]
    Or,
    And,
}

impl Joiner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Joiner::Or => "OR",
            Joiner::And => "AND",
        }
    }

    /// Strict parse of the wire token. Callers default unknown tokens to
    /// [`Joiner::Or`] so positional alignment with `models` is preserved.
    pub fn parse(raw: &str) -> Option<Joiner> {
        match raw.trim() {
            "OR" => Some(Joiner::Or),
            "AND" => Some(Joiner::And),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// QueryState
// ---------------------------------------------------------------------------

/// The full decoded view state. See the module docs for the invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryState {
    pub date: TradingDay,
    pub signal_id: Option<String>,
    pub q: Option<String>,
    pub strategy_type: Option<String>,
    pub models: Vec<String>,
    pub conditions: Vec<Joiner>,
    pub page: u32,
    pub page_size: u32,
}

impl QueryState {
    /// Default state for a trading day: no filters, first page.
    pub fn new(date: TradingDay) -> Self {
        Self {
            date,
            signal_id: None,
            q: None,
            strategy_type: None,
            models: Vec::new(),
            conditions: Vec::new(),
            page: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// `conditions` carries exactly one joiner per adjacent model pair.
    pub fn invariant_holds(&self) -> bool {
        self.conditions.len() == self.models.len().saturating_sub(1)
    }

    /// Re-establish the structural invariant in place.
    ///
    /// Deduplicates `models` (keeping first occurrences), then truncates or
    /// pads `conditions` to `models.len() - 1`. Padding repeats the first
    /// existing joiner; with no joiners to copy it falls back to `Or`.
    pub fn repair(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.models.retain(|m| seen.insert(m.clone()));

        let want = self.models.len().saturating_sub(1);
        let filler = self.conditions.first().copied().unwrap_or_default();
        self.conditions.truncate(want);
        while self.conditions.len() < want {
            self.conditions.push(filler);
        }
    }

    /// Merge a patch into the state. `now_local` feeds the date resolver
    /// when the patch clears or replaces the trading day.
    pub fn apply(&mut self, patch: &QueryPatch, now_local: NaiveDateTime) {
        match &patch.date {
            Patch::Keep => {}
            Patch::Clear => self.date = resolver::resolve(now_local),
            Patch::Set(candidate) => {
                self.date = resolver::correct(*candidate, now_local)
                    .unwrap_or(TradingDay(*candidate));
            }
        }
        patch.signal_id.apply_to(&mut self.signal_id);
        patch.q.apply_to(&mut self.q);
        patch.strategy_type.apply_to(&mut self.strategy_type);
        match &patch.models {
            Patch::Keep => {}
            Patch::Clear => self.models.clear(),
            Patch::Set(v) => self.models = v.clone(),
        }
        match &patch.conditions {
            Patch::Keep => {}
            Patch::Clear => self.conditions.clear(),
            Patch::Set(v) => self.conditions = v.clone(),
        }
        match patch.page {
            Patch::Keep => {}
            Patch::Clear => self.page = 0,
            Patch::Set(p) => self.page = p,
        }
        match patch.page_size {
            Patch::Keep => {}
            Patch::Clear => self.page_size = DEFAULT_PAGE_SIZE,
            Patch::Set(s) => self.page_size = if s == 0 { DEFAULT_PAGE_SIZE } else { s },
        }
        self.repair();
    }
}

// ---------------------------------------------------------------------------
// Patches
// ---------------------------------------------------------------------------

/// Three-way field update: leave alone, reset to the field's default, or
/// replace. The blanket `Default` is `Keep`, so `QueryPatch::default()`
/// touches nothing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Patch<T> {
    #[default]
    Keep,
    Clear,
    Set(T),
}

impl<T: Clone> Patch<T> {
    fn apply_to(&self, slot: &mut Option<T>) {
        match self {
            Patch::Keep => {}
            Patch::Clear => *slot = None,
            Patch::Set(v) => *slot = Some(v.clone()),
        }
    }

    pub fn is_keep(&self) -> bool {
        matches!(self, Patch::Keep)
    }
}

/// Partial update over [`QueryState`]. Fields default to [`Patch::Keep`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryPatch {
    pub date: Patch<NaiveDate>,
    pub signal_id: Patch<String>,
    pub q: Patch<String>,
    pub strategy_type: Patch<String>,
    pub models: Patch<Vec<String>>,
    pub conditions: Patch<Vec<Joiner>>,
    pub page: Patch<u32>,
    pub page_size: Patch<u32>,
}

impl QueryPatch {
    /// Fold a later patch over this one, field by field. A later `Keep`
    /// preserves whatever was staged earlier; anything else wins. This is
    /// what makes a debounced burst equivalent to its last-write union.
    pub fn merge(&mut self, later: QueryPatch) {
        fn fold<T: Clone>(slot: &mut Patch<T>, later: Patch<T>) {
            if !later.is_keep() {
                *slot = later;
            }
        }
        fold(&mut self.date, later.date);
        fold(&mut self.signal_id, later.signal_id);
        fold(&mut self.q, later.q);
        fold(&mut self.strategy_type, later.strategy_type);
        fold(&mut self.models, later.models);
        fold(&mut self.conditions, later.conditions);
        fold(&mut self.page, later.page);
        fold(&mut self.page_size, later.page_size);
    }

    pub fn is_empty(&self) -> bool {
        self.date.is_keep()
            && self.signal_id.is_keep()
            && self.q.is_keep()
            && self.strategy_type.is_keep()
            && self.models.is_keep()
            && self.conditions.is_keep()
            && self.page.is_keep()
            && self.page_size.is_keep()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
