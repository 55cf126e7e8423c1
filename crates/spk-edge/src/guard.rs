//! Edge navigation guard — pure verdict logic.
//!
//! Deterministic function of the incoming navigation and exchange-local
//! `now`. No IO; the routing layer supplies both and acts on the verdict.
//!
//! The guard is surgical: it rewrites only what it must (the `date` param,
//! the model/condition pair, sensitive auth params) and leaves every other
//! parameter untouched and in its original position.
//!
//! # Single-hop guarantee
//!
//! A redirect is only issued when a rewrite actually changed something,
//! and every rewrite is a fixpoint: date correction is idempotent, the
//! condition repair is idempotent, and stripped params are gone. Feeding a
//! redirect target back through [`evaluate`] therefore always yields
//! [`EdgeVerdict::Proceed`].

use chrono::NaiveDateTime;
use url::form_urlencoded;

use spk_query::codec::split_list;
use spk_query::Joiner;
use spk_session::resolver;

/// Query parameters that must never survive into the visible URL. `token`
/// and `code` additionally seed the session cookie before being dropped.
pub const SENSITIVE_PARAMS: &[&str] = &[
    "token",
    "code",
    "login",
    "user_id",
    "nickname",
    "provider",
    "is_new_user",
];

/// The slice of an incoming navigation the guard looks at.
#[derive(Debug, Clone, Copy)]
pub struct NavRequest<'a> {
    pub path: &'a str,
    /// Raw query string, without the leading `?`.
    pub query: &'a str,
}

/// Outcome of a guard evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeVerdict {
    /// Nothing to fix; let the request through.
    Proceed,
    /// Redirect to the repaired URL, optionally installing a session
    /// cookie from a stripped `token`/`code` param.
    Redirect {
        location: String,
        session_token: Option<String>,
    },
}

/// Evaluate one navigation against the date rules, the filter invariant,
/// and the sensitive-param policy.
pub fn evaluate(req: &NavRequest<'_>, now_local: NaiveDateTime) -> EdgeVerdict {
    let mut pairs: Vec<(String, String)> = form_urlencoded::parse(req.query.as_bytes())
        .into_owned()
        .collect();
    let mut changed = false;

    let session_token = pairs
        .iter()
        .find(|(k, _)| k == "token")
        .or_else(|| pairs.iter().find(|(k, _)| k == "code"))
        .map(|(_, v)| v.clone());

    let before = pairs.len();
    pairs.retain(|(k, _)| !SENSITIVE_PARAMS.contains(&k.as_str()));
    changed |= pairs.len() != before;

    // The codec is last-wins for these; collapse duplicates the same way.
    for key in ["date", "models", "condition"] {
        changed |= keep_last(&mut pairs, key);
    }

    for (key, value) in pairs.iter_mut() {
        if key != "date" {
            continue;
        }
        let fixed = match resolver::parse_candidate(value) {
            Some(candidate) => resolver::correct(candidate, now_local).map(|d| d.to_string()),
            None => Some(resolver::resolve(now_local).to_string()),
        };
        if let Some(fixed) = fixed {
            *value = fixed;
            changed = true;
        }
    }

    changed |= repair_model_filters(&mut pairs);

    if !changed {
        return EdgeVerdict::Proceed;
    }

    let mut ser = form_urlencoded::Serializer::new(String::new());
    for (k, v) in &pairs {
        ser.append_pair(k, v);
    }
    let query = ser.finish();
    let location = if query.is_empty() {
        req.path.to_owned()
    } else {
        format!("{}?{}", req.path, query)
    };
    EdgeVerdict::Redirect {
        location,
        session_token,
    }
}

/// Drop all but the last occurrence of `key`. Returns whether anything
/// was removed.
fn keep_last(pairs: &mut Vec<(String, String)>, key: &str) -> bool {
    let Some(last) = pairs.iter().rposition(|(k, _)| k == key) else {
        return false;
    };
    let before = pairs.len();
    let mut idx = 0;
    pairs.retain(|(k, _)| {
        let keep = k != key || idx == last;
        idx += 1;
        keep
    });
    pairs.len() != before
}

/// Re-establish the `models`/`condition` invariant in place: deduped
/// models, exactly one joiner per adjacent pair (padded with the first
/// existing joiner, default `OR`), and no orphan `condition`.
fn repair_model_filters(pairs: &mut Vec<(String, String)>) -> bool {
    let mut changed = false;

    let models_idx = pairs.iter().position(|(k, _)| k == "models");
    let tokens = models_idx
        .map(|i| split_list(&pairs[i].1))
        .unwrap_or_default();
    let mut deduped: Vec<String> = Vec::new();
    for t in tokens {
        if !deduped.contains(&t) {
            deduped.push(t);
        }
    }

    match models_idx {
        Some(i) if deduped.is_empty() => {
            pairs.remove(i);
            changed = true;
        }
        Some(i) => {
            let canon = deduped.join(",");
            if pairs[i].1 != canon {
                pairs[i].1 = canon;
                changed = true;
            }
        }
        None => {}
    }

    let condition_idx = pairs.iter().position(|(k, _)| k == "condition");
    let want = deduped.len().saturating_sub(1);

    if want == 0 {
        if let Some(i) = condition_idx {
            pairs.remove(i);
            changed = true;
        }
        return changed;
    }

    let existing: Vec<Joiner> = condition_idx
        .map(|i| {
            split_list(&pairs[i].1)
                .iter()
                .map(|t| Joiner::parse(t).unwrap_or_default())
                .collect()
        })
        .unwrap_or_default();
    let filler = existing.first().copied().unwrap_or_default();
    let mut repaired = existing;
    repaired.truncate(want);
    while repaired.len() < want {
        repaired.push(filler);
    }
    let canon = repaired
        .iter()
        .map(Joiner::as_str)
        .collect::<Vec<_>>()
        .join(",");

    match condition_idx {
        Some(i) => {
            if pairs[i].1 != canon {
                pairs[i].1 = canon;
                changed = true;
            }
        }
        None => {
            let insert_at = pairs
                .iter()
                .position(|(k, _)| k == "models")
                .map(|i| i + 1)
                .unwrap_or(pairs.len());
            pairs.insert(insert_at, ("condition".to_owned(), canon));
            changed = true;
        }
    }
    changed
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
