//! API-Football upstream.
//!
//! Every request has a hard timeout. Callers never see an error from `fetch`:
//! a failed request is `FetchOutcome::Failed`, whose records are empty, so one
//! flaky sub-request cannot abort a whole refresh.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::FixtureId;

pub const LIVE_FIXTURES_PATH: &str = "/fixtures?live=all";
const API_KEY_HEADER: &str = "x-apisports-key";

pub fn statistics_path(id: FixtureId) -> String {
    format!("/fixtures/statistics?fixture={id}")
}

pub fn events_path(id: FixtureId) -> String {
    format!("/fixtures/events?fixture={id}")
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("HTTP {0}")]
    Status(u16),
    #[error("malformed body: {0}")]
    Decode(String),
    #[error("`response` field is not an array")]
    Shape,
    #[error("provider rejected request: {0}")]
    Rejected(String),
}

impl UpstreamError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout      => "timeout",
            Self::Transport(_) => "transport",
            Self::Status(_)    => "status",
            Self::Decode(_)    => "decode",
            Self::Shape        => "shape",
            Self::Rejected(_)  => "rejected",
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Result of one upstream call once failures have been absorbed.
#[derive(Debug)]
pub enum FetchOutcome {
    Records(Vec<Value>),
    Failed(UpstreamError),
}

impl FetchOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Records on success, empty on failure.
    pub fn into_records(self) -> Vec<Value> {
        match self {
            Self::Records(r) => r,
            Self::Failed(_)  => Vec::new(),
        }
    }
}

/// Anything that can answer an API-Football resource path.
#[async_trait]
pub trait FixtureSource: Send + Sync {
    async fn get(&self, path: &str) -> Result<Vec<Value>, UpstreamError>;
}

/// Issue one request and fold any failure into an empty outcome.
pub async fn fetch(source: &dyn FixtureSource, path: &str) -> FetchOutcome {
    match source.get(path).await {
        Ok(records) => {
            debug!(path, records = records.len(), "upstream ok");
            FetchOutcome::Records(records)
        }
        Err(e) => {
            warn!(path, kind = e.kind(), error = %e, "upstream fetch failed, treating as empty");
            FetchOutcome::Failed(e)
        }
    }
}

/// Unwrap the API-Football envelope `{ "response": [...], "errors": ... }`.
///
/// Missing `response` counts as an empty success. A non-empty `errors` with no
/// payload is what the provider sends when the quota is exhausted.
pub fn parse_envelope(raw: &str) -> Result<Vec<Value>, UpstreamError> {
    let mut body: Value = serde_json::from_str(raw).map_err(|e| UpstreamError::Decode(e.to_string()))?;

    let records = match body.get_mut("response").map(Value::take) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(UpstreamError::Shape),
    };

    if records.is_empty() {
        if let Some(errors) = body.get("errors").filter(|e| has_errors(e)) {
            return Err(UpstreamError::Rejected(errors.to_string()));
        }
    }

    Ok(records)
}

fn has_errors(errors: &Value) -> bool {
    match errors {
        Value::Array(a)  => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::String(s) => !s.is_empty(),
        _ => false,
    }
}

// ── HTTP client ──────────────────────────────────────────────────────────────

pub struct ApiFootballClient {
    client:   reqwest::Client,
    base_url: String,
    api_key:  String,
}

impl ApiFootballClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key:  impl Into<String>,
        timeout:  Duration,
    ) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("LiveCache/1.0")
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key:  api_key.into(),
        })
    }
}

#[async_trait]
impl FixtureSource for ApiFootballClient {
    async fn get(&self, path: &str) -> Result<Vec<Value>, UpstreamError> {
        let url = format!("{}{}", self.base_url, path);

        let resp = self.client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let raw = resp.text().await?;
        parse_envelope(&raw)
    }
}
