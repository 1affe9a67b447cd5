//! Text-generation pass-through. The API key stays on the server; the client
//! only ever sends `{ "prompt": ... }` and gets `{ "text": ... }` back.

use anyhow::{Context, Result};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::AiConfig;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("AI analysis is not configured")]
    NotConfigured,
    #[error("AI upstream request failed: {0}")]
    Upstream(String),
    #[error("AI upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("AI upstream returned no text")]
    EmptyResponse,
}

pub struct AiProxy {
    client:     reqwest::Client,
    api_url:    String,
    api_key:    Option<String>,
    model:      String,
    max_tokens: u32,
}

impl AiProxy {
    pub fn new(cfg: &AiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .context("failed to create AI http client")?;

        Ok(Self {
            client,
            api_url:    cfg.api_url.clone(),
            api_key:    cfg.api_key.clone(),
            model:      cfg.model.clone(),
            max_tokens: cfg.max_tokens,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    #[instrument(skip_all, fields(prompt_len = prompt.len()))]
    pub async fn complete(&self, prompt: &str) -> Result<String, ProxyError> {
        let key = self.api_key.as_deref().ok_or(ProxyError::NotConfigured)?;

        let payload = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [
                { "role": "user", "content": prompt }
            ]
        });

        let resp = self.client
            .post(&self.api_url)
            .header("x-api-key", key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProxyError::Upstream(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProxyError::Status {
                status: status.as_u16(),
                body:   body.chars().take(200).collect(),
            });
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| ProxyError::Upstream(e.to_string()))?;

        let text = concat_text(&body);
        if text.is_empty() {
            return Err(ProxyError::EmptyResponse);
        }
        debug!(text_len = text.len(), "AI analysis ok");
        Ok(text)
    }
}

/// Join every `{"type": "text"}` block of `content`.
fn concat_text(body: &Value) -> String {
    body.get("content")
        .and_then(Value::as_array)
        .map(|blocks| {
            blocks
                .iter()
                .filter(|b| b["type"] == "text")
                .filter_map(|b| b["text"].as_str())
                .collect::<String>()
        })
        .unwrap_or_default()
}
