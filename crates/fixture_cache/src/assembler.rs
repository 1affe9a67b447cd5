//! Reader-side views. Each call loads the snapshot once and works only on that
//! generation, so it never blocks on or mixes with a refresh in flight.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::store::CacheStore;
use crate::types::CacheSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveView {
    pub last_update: Option<DateTime<Utc>>,
    pub fixtures:    Vec<LiveFixture>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveFixture {
    pub fixture: Value,
    pub stats:   Vec<Value>,
    pub events:  Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthView {
    pub status:        &'static str,
    pub last_update:   Option<DateTime<Utc>>,
    pub fixture_count: usize,
    pub refreshing:    bool,
    pub uptime:        String,
}

pub fn assemble_live_view(store: &CacheStore) -> LiveView {
    live_view(&store.read())
}

/// Fixtures missing a detail entry get empty stats and events.
pub fn live_view(snapshot: &CacheSnapshot) -> LiveView {
    let fixtures = snapshot
        .fixtures
        .iter()
        .map(|fx| {
            let detail = fx.id().and_then(|id| snapshot.detail(id));
            LiveFixture {
                fixture: fx.raw().clone(),
                stats:   detail.map(|d| d.stats.clone()).unwrap_or_default(),
                events:  detail.map(|d| d.events.clone()).unwrap_or_default(),
            }
        })
        .collect();

    LiveView {
        last_update: snapshot.last_update,
        fixtures,
    }
}

pub fn assemble_health(store: &CacheStore, uptime: Duration) -> HealthView {
    let snapshot = store.read();
    HealthView {
        status:        "ok",
        last_update:   snapshot.last_update,
        fixture_count: snapshot.fixtures.len(),
        refreshing:    store.is_refreshing(),
        uptime:        format!("{}s", uptime.as_secs()),
    }
}
