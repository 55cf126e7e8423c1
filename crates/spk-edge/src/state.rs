//! Shared runtime state for spk-edge.
//!
//! All types here are `Clone`-able (via `Arc` or copy). Handlers receive
//! `State<Arc<EdgeState>>` from Axum; this module owns nothing async itself.
//! The clock is injected so scenario tests can pin the exchange-local time.

use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use spk_session::{Clock, MarketTime, SystemClock};

use crate::cookies::CookieConfig;

/// Environment variable naming the API origin navigations are proxied to.
pub const UPSTREAM_URL_ENV: &str = "SPK_UPSTREAM_URL";

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in the health response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// EdgeState
// ---------------------------------------------------------------------------

/// Cloneable (Arc) handle shared across all Axum handlers.
#[derive(Clone)]
pub struct EdgeState {
    /// Static build metadata.
    pub build: BuildInfo,
    /// How session cookies are written on this deployment.
    pub cookie: CookieConfig,
    /// Exchange timezone; every guard verdict is computed in it.
    pub market: MarketTime,
    /// Injected time source.
    pub clock: Arc<dyn Clock>,
    /// API origin requests are forwarded to, without a trailing slash.
    pub upstream: String,
    /// Shared client for upstream forwarding.
    pub http: reqwest::Client,
}

impl EdgeState {
    pub fn new(
        upstream: impl Into<String>,
        cookie: CookieConfig,
        market: MarketTime,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let upstream = upstream.into().trim_end_matches('/').to_owned();
        Self {
            build: BuildInfo {
                service: "spk-edge",
                version: env!("CARGO_PKG_VERSION"),
            },
            cookie,
            market,
            clock,
            upstream,
            http: reqwest::Client::new(),
        }
    }

    /// Build state from the process environment. The upstream origin is the
    /// only required variable; cookie and timezone settings have defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        let upstream = std::env::var(UPSTREAM_URL_ENV)
            .with_context(|| format!("{UPSTREAM_URL_ENV} must point at the API origin"))?;
        Ok(Self::new(
            upstream,
            CookieConfig::from_env(),
            MarketTime::from_env(),
            Arc::new(SystemClock),
        ))
    }

    /// Current exchange-local wall time, from the injected clock.
    pub fn now_local(&self) -> chrono::NaiveDateTime {
        self.market.local_now(self.clock.as_ref())
    }
}
