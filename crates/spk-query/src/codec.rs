//! Query-string codec for [`QueryState`].
//!
//! One fixed wire shape, shared by the client synchronizer and the edge
//! guard. Decoding is total: unknown keys are ignored, malformed values
//! fall back to defaults, and the date candidate goes through the
//! `spk-session` resolver. Encoding is canonical: a fixed key order with
//! defaults omitted, so equal states always produce equal strings and the
//! "navigate only on change" comparison is a plain string compare.
//!
//! Wire keys, in canonical order:
//! `date, signalId, q, models, condition, page, pageSize, strategy_type`.
//! `models` and `condition` are comma-joined lists.

use chrono::NaiveDateTime;
use spk_session::resolver;
use url::form_urlencoded;

use crate::state::{Joiner, QueryState, DEFAULT_PAGE_SIZE};

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

/// Decode a raw query string (with or without a leading `?`) into a
/// repaired [`QueryState`]. Total; never fails.
///
/// Repeated keys keep the last occurrence. A missing or unparseable `date`
/// resolves to the active trading day for `now_local`.
pub fn parse(raw_query: &str, now_local: NaiveDateTime) -> QueryState {
    let raw = raw_query.strip_prefix('?').unwrap_or(raw_query);

    let mut date_raw: Option<String> = None;
    let mut state = QueryState::new(resolver::resolve(now_local));

    for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
        match key.as_ref() {
            "date" => date_raw = Some(value.into_owned()),
            "signalId" => state.signal_id = non_empty(&value),
            "q" => state.q = non_empty(&value),
            "strategy_type" => state.strategy_type = non_empty(&value),
            "models" => state.models = split_list(&value),
            "condition" => {
                state.conditions = split_list(&value)
                    .iter()
                    .map(|t| Joiner::parse(t).unwrap_or_default())
                    .collect();
            }
            "page" => state.page = value.trim().parse().unwrap_or(0),
            "pageSize" => {
                state.page_size = match value.trim().parse() {
                    Ok(0) | Err(_) => DEFAULT_PAGE_SIZE,
                    Ok(n) => n,
                };
            }
            _ => {}
        }
    }

    state.date = resolver::resolve_param(date_raw.as_deref(), now_local);
    state.repair();
    state
}

/// Encode a state into its canonical query string (no leading `?`).
///
/// Defaults are omitted: empty optionals, empty lists, `page=0`, and the
/// default page size all disappear from the wire.
pub fn serialize(state: &QueryState) -> String {
    let mut out = form_urlencoded::Serializer::new(String::new());
    out.append_pair("date", &state.date.to_string());
    if let Some(id) = state.signal_id.as_deref().filter(|s| !s.is_empty()) {
        out.append_pair("signalId", id);
    }
    if let Some(q) = state.q.as_deref().filter(|s| !s.is_empty()) {
        out.append_pair("q", q);
    }
    if !state.models.is_empty() {
        out.append_pair("models", &state.models.join(","));
    }
    if !state.conditions.is_empty() {
        let joined = state
            .conditions
            .iter()
            .map(Joiner::as_str)
            .collect::<Vec<_>>()
            .join(",");
        out.append_pair("condition", &joined);
    }
    if state.page > 0 {
        out.append_pair("page", &state.page.to_string());
    }
    if state.page_size != DEFAULT_PAGE_SIZE {
        out.append_pair("pageSize", &state.page_size.to_string());
    }
    if let Some(st) = state.strategy_type.as_deref().filter(|s| !s.is_empty()) {
        out.append_pair("strategy_type", st);
    }
    out.finish()
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}

/// Split a comma-joined list parameter, dropping empty segments. Shared
/// with the edge guard's surgical re-checks.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
