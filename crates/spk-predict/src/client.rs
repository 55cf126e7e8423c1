//! REST-backed [`PredictionService`].
//!
//! Thin reqwest client with an injectable base URL so tests can point it
//! at a mock server. HTTP status codes map onto the [`ServiceError`]
//! taxonomy here and nowhere else; callers never see raw statuses.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use spk_schemas::{Prediction, SessionSnapshot, SlotSnapshot, TradingDay};

use crate::service::{PredictionService, ServiceError, SubmitRequest};

/// Prediction backend over HTTP.
///
/// The bearer token is passed in by the caller; do not log it.
#[derive(Debug, Clone)]
pub struct RestPredictionService {
    http: reqwest::Client,
    base_url: String,
    bearer: Option<String>,
}

impl RestPredictionService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            bearer: None,
        }
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<T, ServiceError> {
        let resp = self
            .authorized(req)
            .send()
            .await
            .map_err(|e| ServiceError::Transport(format!("request failed: {e}")))?;

        let status = resp.status();
        if status.is_success() {
            resp.json::<T>()
                .await
                .map_err(|e| ServiceError::Transport(format!("response decode failed: {e}")))
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(classify(status, &body))
        }
    }
}

/// 401/403 are auth; 400/409/422 are business rejections carrying a
/// message; everything else is transport.
fn classify(status: StatusCode, body: &str) -> ServiceError {
    match status.as_u16() {
        401 | 403 => ServiceError::Auth,
        400 | 409 | 422 => ServiceError::Validation(extract_message(body)),
        _ => ServiceError::Transport(format!("http status {}", status.as_u16())),
    }
}

fn extract_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message")?.as_str().map(str::to_owned))
        .unwrap_or_else(|| {
            if body.is_empty() {
                "request rejected".to_owned()
            } else {
                body.to_owned()
            }
        })
}

#[async_trait]
impl PredictionService for RestPredictionService {
    async fn today_session(&self) -> Result<SessionSnapshot, ServiceError> {
        self.execute(self.http.get(self.url("/v1/session/today")))
            .await
    }

    async fn remaining_slots(&self, day: TradingDay) -> Result<SlotSnapshot, ServiceError> {
        let req = self
            .http
            .get(self.url("/v1/predictions/slots"))
            .query(&[("date", day.to_string())]);
        self.execute(req).await
    }

    async fn predictions_for_day(&self, day: TradingDay) -> Result<Vec<Prediction>, ServiceError> {
        let req = self
            .http
            .get(self.url("/v1/predictions"))
            .query(&[("date", day.to_string())]);
        self.execute(req).await
    }

    async fn submit(&self, req: &SubmitRequest) -> Result<Prediction, ServiceError> {
        self.execute(self.http.post(self.url("/v1/predictions")).json(req))
            .await
    }

    async fn cancel(&self, prediction_id: &str) -> Result<Prediction, ServiceError> {
        let path = format!("/v1/predictions/{prediction_id}/cancel");
        self.execute(self.http.post(self.url(&path))).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
