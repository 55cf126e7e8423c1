//! Axum router and all HTTP handlers for spk-edge.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers (CORS, tracing). All handlers are `pub(crate)` so the
//! scenario tests in `tests/` can compose the router directly.
//!
//! The navigation guard runs as router middleware over page navigations
//! only: GET requests outside `/v1` and `/logout`. API calls and the edge's
//! own endpoints pass through untouched so the guard can never redirect a
//! JSON request.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    api_types::HealthResponse,
    guard::{self, EdgeVerdict, NavRequest},
    state::EdgeState,
};

/// Request headers copied onto the upstream forward. Everything else is
/// hop-local and dropped.
const FORWARDED_REQUEST_HEADERS: &[header::HeaderName] = &[
    header::ACCEPT,
    header::AUTHORIZATION,
    header::CONTENT_TYPE,
    header::COOKIE,
];

/// Forwarded request bodies above this size are rejected outright.
const MAX_FORWARD_BODY_BYTES: usize = 1 << 20;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// The navigation guard is attached here because it is routing semantics,
/// not instrumentation; CORS and tracing layers are **not** applied here so
/// tests can use the bare router.
pub fn build_router(state: Arc<EdgeState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/logout", get(logout))
        .fallback(forward)
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            navigation_guard,
        ))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Navigation guard middleware
// ---------------------------------------------------------------------------

/// True for requests the guard evaluates: page navigations, never API
/// traffic or the edge's own endpoints.
fn is_guarded(method: &Method, path: &str) -> bool {
    method == Method::GET && !path.starts_with("/v1") && path != "/logout"
}

pub(crate) async fn navigation_guard(
    State(st): State<Arc<EdgeState>>,
    req: Request,
    next: Next,
) -> Response {
    if !is_guarded(req.method(), req.uri().path()) {
        return next.run(req).await;
    }

    let verdict = guard::evaluate(
        &NavRequest {
            path: req.uri().path(),
            query: req.uri().query().unwrap_or(""),
        },
        st.now_local(),
    );

    match verdict {
        EdgeVerdict::Proceed => next.run(req).await,
        EdgeVerdict::Redirect {
            location,
            session_token,
        } => {
            let nav_id = Uuid::new_v4();
            info!(
                %nav_id,
                from = %req.uri(),
                to = %location,
                sets_cookie = session_token.is_some(),
                "navigation repaired"
            );
            let mut resp = Response::builder()
                .status(StatusCode::FOUND)
                .header(header::LOCATION, &location);
            if let Some(token) = session_token {
                resp = resp.header(header::SET_COOKIE, st.cookie.build_set(&token));
            }
            resp.body(Body::empty())
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
    }
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<EdgeState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /logout
// ---------------------------------------------------------------------------

/// Expire the session cookie and send the client home.
pub(crate) async fn logout(State(st): State<Arc<EdgeState>>) -> impl IntoResponse {
    info!("logout");
    (
        StatusCode::FOUND,
        [
            (header::LOCATION, "/".to_owned()),
            (header::SET_COOKIE, st.cookie.build_expire()),
        ],
    )
}

// ---------------------------------------------------------------------------
// Fallback — upstream forward
// ---------------------------------------------------------------------------

/// Forward any request the edge does not answer itself to the upstream API
/// origin, preserving method, path, query, selected headers, and body.
pub(crate) async fn forward(State(st): State<Arc<EdgeState>>, req: Request) -> Response {
    let nav_id = Uuid::new_v4();
    let path_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());
    let url = format!("{}{path_query}", st.upstream);

    let (parts, body) = req.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_FORWARD_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(%nav_id, error = %err, "forward body rejected");
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
    };

    let mut upstream_req = st.http.request(parts.method.clone(), &url);
    for name in FORWARDED_REQUEST_HEADERS {
        if let Some(value) = parts.headers.get(name) {
            upstream_req = upstream_req.header(name, value);
        }
    }

    info!(%nav_id, method = %parts.method, path = %path_query, "forward");

    let upstream_resp = match upstream_req.body(bytes).send().await {
        Ok(resp) => resp,
        Err(err) => {
            warn!(%nav_id, error = %err, "upstream unreachable");
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    let status = upstream_resp.status();
    let content_type = upstream_resp.headers().get(header::CONTENT_TYPE).cloned();
    let set_cookies: Vec<_> = upstream_resp
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .cloned()
        .collect();

    let body = match upstream_resp.bytes().await {
        Ok(body) => body,
        Err(err) => {
            warn!(%nav_id, error = %err, "upstream body read failed");
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    let mut builder = Response::builder().status(status);
    if let Some(ct) = content_type {
        builder = builder.header(header::CONTENT_TYPE, ct);
    }
    for cookie in set_cookies {
        builder = builder.header(header::SET_COOKIE, cookie);
    }
    builder
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::BAD_GATEWAY.into_response())
}
