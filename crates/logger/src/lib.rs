/// LiveCache — Logger
/// JSONL event stream (one file per UTC day)

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

pub struct EventLogger {
    log_dir: PathBuf,
}

impl EventLogger {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        let dir = log_dir.into();
        fs::create_dir_all(&dir).ok();
        Self { log_dir: dir }
    }

    pub fn log<T: Serialize>(&self, event: &T) -> Result<()> {
        let date  = Utc::now().format("%Y-%m-%d").to_string();
        let path  = self.log_dir.join(format!("{date}.jsonl"));
        let line  = serde_json::to_string(event)?;
        let mut f = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(f, "{line}")?;
        Ok(())
    }
}

pub fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

// ── Event types ──────────────────────────────────────────────────────────────

#[derive(Serialize, Debug)]
pub struct ServiceStartEvent {
    pub ts:                  String,
    pub event:               &'static str,   // "SERVICE_START"
    pub bind:                String,
    pub fetch_interval_secs: u64,
    pub batch_size:          usize,
    pub batch_pause_ms:      u64,
    pub ai_proxy_enabled:    bool,
}

#[derive(Serialize, Debug)]
pub struct CacheRefreshEvent {
    pub ts:             String,
    pub event:          &'static str,   // "CACHE_REFRESH"
    pub outcome:        &'static str,   // "published" | "empty" | "failed"
    pub fixtures:       usize,
    pub upstream_calls: usize,
    pub failed_fetches: usize,
    pub duration_ms:    u64,
    pub error:          Option<String>,
}
