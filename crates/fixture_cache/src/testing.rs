//! Scripted `FixtureSource` for engine tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::upstream::{FixtureSource, UpstreamError};

#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Records(Vec<Value>),
    Fail,
    Panic,
}

#[derive(Default)]
pub(crate) struct MockSource {
    replies:       Mutex<HashMap<String, Reply>>,
    calls:         Mutex<Vec<(String, Instant)>>,
    in_flight:     AtomicUsize,
    max_in_flight: AtomicUsize,
    latency:       Duration,
}

impl MockSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_latency(latency: Duration) -> Self {
        Self { latency, ..Self::default() }
    }

    pub(crate) fn set(&self, path: impl Into<String>, reply: Reply) {
        self.replies.lock().unwrap().insert(path.into(), reply);
    }

    pub(crate) fn calls(&self) -> Vec<(String, Instant)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FixtureSource for MockSource {
    async fn get(&self, path: &str) -> Result<Vec<Value>, UpstreamError> {
        self.calls.lock().unwrap().push((path.to_string(), Instant::now()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let reply = self.replies.lock().unwrap().get(path).cloned();
        match reply {
            None => Ok(Vec::new()),
            Some(Reply::Records(r)) => Ok(r),
            Some(Reply::Fail) => Err(UpstreamError::Status(503)),
            Some(Reply::Panic) => panic!("scripted panic for {path}"),
        }
    }
}
