//! Scenario: Edge guard and client codec agree on every repair
//!
//! # Invariant under test
//!
//! The guard runs at the edge; the codec runs in the client. Both call
//! the same resolver and the same list-repair rules, so for any query
//! carrying a `date`, the date the guard writes (or lets through) is the
//! date the codec resolves, and the `models`/`condition` lists left
//! behind by the guard decode to exactly the codec's repaired state.
//! Without this, the first client commit after an edge redirect would
//! navigate again and the correction would no longer be single-hop.

use chrono::{NaiveDate, NaiveDateTime};

use spk_edge::guard::{evaluate, EdgeVerdict, NavRequest};
use spk_query::codec;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Wednesday 2024-03-06 12:00, past the cutoff.
fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 6)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

/// The query as the guard leaves it: the redirect target's query, or the
/// original when the guard proceeds.
fn guarded_query(raw: &str) -> String {
    match evaluate(
        &NavRequest {
            path: "/signals",
            query: raw,
        },
        now(),
    ) {
        EdgeVerdict::Proceed => raw.to_owned(),
        EdgeVerdict::Redirect { location, .. } => location
            .split_once('?')
            .map(|(_, q)| q.to_owned())
            .unwrap_or_default(),
    }
}

// ---------------------------------------------------------------------------
// 1. Date resolution agrees across contexts
// ---------------------------------------------------------------------------

#[test]
fn guard_and_codec_resolve_the_same_date() {
    let cases = [
        "date=2024-03-05",        // valid weekday, untouched
        "date=2024-03-03",        // Sunday, walks back
        "date=2024-03-02",        // Saturday, walks back
        "date=2024-03-20",        // future, clamps to today
        "date=2023-01-05",        // before the lookback window
        "date=half%20past%20ten", // unparseable
        "date=2024-03-04&date=2024-03-03", // duplicate, last wins
    ];
    for raw in cases {
        let edge = codec::parse(&guarded_query(raw), now());
        let client = codec::parse(raw, now());
        assert_eq!(edge.date, client.date, "raw query: {raw}");
    }
}

// ---------------------------------------------------------------------------
// 2. Filter repair agrees across contexts
// ---------------------------------------------------------------------------

#[test]
fn guard_and_codec_repair_the_same_filters() {
    let cases = [
        "date=2024-03-06&models=alpha,beta",                  // missing condition
        "date=2024-03-06&models=a,a,b&condition=AND,OR,AND",  // dupes and excess
        "date=2024-03-06&models=a,b,c&condition=AND",         // too few joiners
        "date=2024-03-06&condition=AND",                      // orphan condition
        "date=2024-03-06&models=solo",                        // single model
        "date=2024-03-06&models=,,",                          // empty segments
    ];
    for raw in cases {
        let edge = codec::parse(&guarded_query(raw), now());
        let client = codec::parse(raw, now());
        assert_eq!(edge.models, client.models, "raw query: {raw}");
        assert_eq!(edge.conditions, client.conditions, "raw query: {raw}");
    }
}

// ---------------------------------------------------------------------------
// 3. The guard's output is a codec fixpoint
// ---------------------------------------------------------------------------

/// Whatever the guard emits, the client's first commit finds nothing to
/// change in the fields it owns, so the redirect is never followed by a
/// second navigation.
#[test]
fn guarded_queries_reencode_without_change() {
    let cases = [
        "date=2024-03-03&models=a,a&condition=XOR",
        "date=bogus&q=sam&models=x,y",
        "token=t&date=2024-03-02&condition=AND",
    ];
    for raw in cases {
        let repaired = guarded_query(raw);
        let state = codec::parse(&repaired, now());
        let reencoded = codec::serialize(&state);
        let restate = codec::parse(&reencoded, now());
        assert_eq!(state, restate, "raw query: {raw}");
    }
}
