//! Refresh cycle: Idle → Running → Idle.
//!
//! 1. live list  2. empty → publish empty snapshot  3. batched details → publish
//! Any error skips the publish; the refresh flag is released on every path.

use chrono::Utc;
use logger::{now_iso, CacheRefreshEvent, EventLogger};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::orchestrator::{BatchPlan, DetailFetcher};
use crate::store::CacheStore;
use crate::types::{CacheSnapshot, Fixture, FixtureId};
use crate::upstream::{fetch, FixtureSource, LIVE_FIXTURES_PATH};

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("live fixture #{index} has no integer fixture.id")]
    MissingFixtureId { index: usize },
    #[error("detail task failed: {0}")]
    Task(String),
}

impl From<JoinError> for RefreshError {
    fn from(e: JoinError) -> Self {
        Self::Task(e.to_string())
    }
}

#[derive(Debug)]
pub enum CycleOutcome {
    /// Another cycle held the refresh flag.
    Skipped,
    /// No live fixtures; an empty snapshot was published. `failed_fetches`
    /// is 1 when the live list itself failed.
    Empty { failed_fetches: usize },
    Published {
        fixtures:       usize,
        upstream_calls: usize,
        failed_fetches: usize,
    },
    /// Nothing published, previous snapshot still served.
    Failed(RefreshError),
}

pub struct RefreshCycle {
    source:  Arc<dyn FixtureSource>,
    store:   Arc<CacheStore>,
    fetcher: DetailFetcher,
    events:  Option<Arc<EventLogger>>,
}

impl RefreshCycle {
    pub fn new(source: Arc<dyn FixtureSource>, store: Arc<CacheStore>, plan: BatchPlan) -> Self {
        Self {
            fetcher: DetailFetcher::new(Arc::clone(&source), plan),
            source,
            store,
            events: None,
        }
    }

    pub fn with_event_log(mut self, events: Arc<EventLogger>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    pub async fn run_once(&self) -> CycleOutcome {
        let Some(_guard) = self.store.begin_refresh() else {
            debug!("refresh still running, skipping tick");
            return CycleOutcome::Skipped;
        };

        let started = Instant::now();
        info!("refreshing live cache");

        let outcome = match self.refresh().await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "cache refresh failed, keeping previous snapshot");
                CycleOutcome::Failed(e)
            }
        };

        self.record(&outcome, started.elapsed());
        outcome
    }

    async fn refresh(&self) -> Result<CycleOutcome, RefreshError> {
        let live = fetch(self.source.as_ref(), LIVE_FIXTURES_PATH).await;
        let live_failed = usize::from(live.is_failure());
        let fixtures: Vec<Fixture> = live.into_records().into_iter().map(Fixture::new).collect();

        if fixtures.is_empty() {
            info!(failed_fetches = live_failed, "no live fixtures");
            self.store.publish(CacheSnapshot::empty_at(Utc::now()));
            return Ok(CycleOutcome::Empty { failed_fetches: live_failed });
        }

        info!("{} live fixtures found", fixtures.len());

        let ids = fixtures
            .iter()
            .enumerate()
            .map(|(index, fx)| fx.id().ok_or(RefreshError::MissingFixtureId { index }))
            .collect::<Result<Vec<FixtureId>, _>>()?;

        let report = self.fetcher.fetch_details(&ids).await?;
        let upstream_calls = 1 + 2 * report.details.len();
        let fixture_count = fixtures.len();

        self.store.publish(CacheSnapshot {
            fixtures,
            details:     report.details,
            last_update: Some(Utc::now()),
        });

        Ok(CycleOutcome::Published {
            fixtures: fixture_count,
            upstream_calls,
            failed_fetches: report.failed_fetches,
        })
    }

    fn record(&self, outcome: &CycleOutcome, elapsed: Duration) {
        let (label, fixtures, upstream_calls, failed_fetches, err) = match outcome {
            CycleOutcome::Skipped => return,
            CycleOutcome::Empty { failed_fetches } => ("empty", 0, 1, *failed_fetches, None),
            CycleOutcome::Published { fixtures, upstream_calls, failed_fetches } => {
                info!(
                    fixtures,
                    upstream_calls,
                    failed_fetches,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "cache refreshed"
                );
                ("published", *fixtures, *upstream_calls, *failed_fetches, None)
            }
            CycleOutcome::Failed(e) => ("failed", 0, 0, 0, Some(e.to_string())),
        };

        if let Some(events) = &self.events {
            let ev = CacheRefreshEvent {
                ts: now_iso(),
                event: "CACHE_REFRESH",
                outcome: label,
                fixtures,
                upstream_calls,
                failed_fetches,
                duration_ms: elapsed.as_millis() as u64,
                error: err,
            };
            if let Err(e) = events.log(&ev) {
                warn!("event log write failed: {e}");
            }
        }
    }
}

/// Run a cycle now and then every `period`.
///
/// Each tick gets its own task, so a slow cycle makes the next tick bounce off
/// the refresh flag instead of queueing behind it, and a panic stays inside
/// its task.
pub fn spawn_scheduler(cycle: Arc<RefreshCycle>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let cycle = Arc::clone(&cycle);
            tokio::spawn(async move {
                cycle.run_once().await;
            });
        }
    })
}
