//! Runtime configuration from the environment (`.env` is loaded first).

use anyhow::{anyhow, Context, Result};
use fixture_cache::BatchPlan;
use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_API_FOOTBALL_BASE: &str = "https://v3.football.api-sports.io";
const DEFAULT_AI_API_URL: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_AI_MODEL: &str = "claude-3-5-haiku-latest";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind:           SocketAddr,
    pub upstream:       UpstreamConfig,
    pub fetch_interval: Duration,
    pub plan:           BatchPlan,
    pub ai:             AiConfig,
    pub dashboard_path: PathBuf,
    pub log_dir:        PathBuf,
}

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub api_key:  String,
    pub timeout:  Duration,
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_url:    String,
    pub api_key:    Option<String>,   // None = /ai-analysis answers 503
    pub model:      String,
    pub max_tokens: u32,
    pub timeout:    Duration,
    pub body_limit: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let host = var("BIND_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = parse_or(&var, "PORT", 3001)?;
        let bind: SocketAddr = format!("{host}:{port}")
            .parse()
            .with_context(|| format!("Invalid BIND_HOST/PORT: {host}:{port}"))?;

        let upstream = UpstreamConfig {
            base_url: var("API_FOOTBALL_BASE").unwrap_or_else(|| DEFAULT_API_FOOTBALL_BASE.to_string()),
            api_key:  var("API_FOOTBALL_KEY").context("API_FOOTBALL_KEY must be set")?,
            timeout:  Duration::from_secs(parse_or(&var, "UPSTREAM_TIMEOUT_SECS", 8)?),
        };

        let fetch_interval_secs: u64 = parse_or(&var, "FETCH_INTERVAL_SECS", 30)?;
        if fetch_interval_secs == 0 {
            return Err(anyhow!("FETCH_INTERVAL_SECS must be > 0"));
        }

        let batch_size: usize = parse_or(&var, "DETAIL_BATCH_SIZE", 5)?;
        if batch_size == 0 {
            return Err(anyhow!("DETAIL_BATCH_SIZE must be > 0"));
        }

        let plan = BatchPlan {
            batch_size,
            pause: Duration::from_millis(parse_or(&var, "BATCH_PAUSE_MS", 200)?),
        };

        let ai = AiConfig {
            api_url:    var("AI_API_URL").unwrap_or_else(|| DEFAULT_AI_API_URL.to_string()),
            api_key:    var("ANTHROPIC_API_KEY"),
            model:      var("AI_MODEL").unwrap_or_else(|| DEFAULT_AI_MODEL.to_string()),
            max_tokens: parse_or(&var, "AI_MAX_TOKENS", 1024)?,
            timeout:    Duration::from_secs(parse_or(&var, "AI_TIMEOUT_SECS", 60)?),
            body_limit: parse_or(&var, "AI_BODY_LIMIT_BYTES", 50 * 1024)?,
        };

        Ok(Self {
            bind,
            upstream,
            fetch_interval: Duration::from_secs(fetch_interval_secs),
            plan,
            ai,
            dashboard_path: var("DASHBOARD_PATH").unwrap_or_else(|| "public/index.html".to_string()).into(),
            log_dir:        var("LOG_DIR").unwrap_or_else(|| "logs".to_string()).into(),
        })
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match var(key) {
        Some(raw) => raw.parse::<T>().map_err(|e| anyhow!("Invalid {key}={raw}: {e}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_key_is_set() {
        let cfg = Config::from_lookup(lookup(&[("API_FOOTBALL_KEY", "abc")])).unwrap();

        assert_eq!(cfg.bind, "0.0.0.0:3001".parse().unwrap());
        assert_eq!(cfg.upstream.base_url, DEFAULT_API_FOOTBALL_BASE);
        assert_eq!(cfg.upstream.timeout, Duration::from_secs(8));
        assert_eq!(cfg.fetch_interval, Duration::from_secs(30));
        assert_eq!(cfg.plan, BatchPlan::default());
        assert_eq!(cfg.ai.body_limit, 51_200);
        assert!(cfg.ai.api_key.is_none());
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("API_FOOTBALL_KEY"));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let cfg = Config::from_lookup(lookup(&[("API_FOOTBALL_KEY", "abc"), ("PORT", "  ")])).unwrap();
        assert_eq!(cfg.bind.port(), 3001);
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = Config::from_lookup(lookup(&[
            ("API_FOOTBALL_KEY", "abc"),
            ("PORT", "8080"),
            ("DETAIL_BATCH_SIZE", "3"),
            ("BATCH_PAUSE_MS", "50"),
            ("ANTHROPIC_API_KEY", "sk-test"),
        ]))
        .unwrap();

        assert_eq!(cfg.bind.port(), 8080);
        assert_eq!(cfg.plan.batch_size, 3);
        assert_eq!(cfg.plan.pause, Duration::from_millis(50));
        assert_eq!(cfg.ai.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn garbage_numbers_are_rejected() {
        let err = Config::from_lookup(lookup(&[("API_FOOTBALL_KEY", "abc"), ("FETCH_INTERVAL_SECS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("FETCH_INTERVAL_SECS"));

        let err = Config::from_lookup(lookup(&[("API_FOOTBALL_KEY", "abc"), ("DETAIL_BATCH_SIZE", "0")]))
            .unwrap_err();
        assert!(err.to_string().contains("DETAIL_BATCH_SIZE"));
    }
}
