//! Batched detail fetch.
//!
//! Fixtures are split into batches of `batch_size`. Inside a batch every fixture
//! gets its statistics and events requested concurrently, so at most
//! `2 × batch_size` upstream calls are ever in flight. The whole batch is joined
//! before the pause, and there is no pause after the last batch.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::debug;

use crate::refresh::RefreshError;
use crate::types::{FixtureDetail, FixtureId};
use crate::upstream::{events_path, fetch, statistics_path, FetchOutcome, FixtureSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlan {
    pub batch_size: usize,
    pub pause:      Duration,
}

impl Default for BatchPlan {
    fn default() -> Self {
        Self {
            batch_size: 5,
            pause:      Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Default)]
pub struct DetailReport {
    pub details:        HashMap<FixtureId, FixtureDetail>,
    pub failed_fetches: usize,
    pub batches:        usize,
}

pub struct DetailFetcher {
    source: Arc<dyn FixtureSource>,
    plan:   BatchPlan,
}

impl DetailFetcher {
    pub fn new(source: Arc<dyn FixtureSource>, plan: BatchPlan) -> Self {
        Self {
            source,
            plan: BatchPlan { batch_size: plan.batch_size.max(1), ..plan },
        }
    }

    pub fn plan(&self) -> BatchPlan {
        self.plan
    }

    pub async fn fetch_details(&self, ids: &[FixtureId]) -> Result<DetailReport, RefreshError> {
        let mut seen = HashSet::with_capacity(ids.len());
        let unique: Vec<FixtureId> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();

        let batches: Vec<&[FixtureId]> = unique.chunks(self.plan.batch_size).collect();
        let mut report = DetailReport {
            details: HashMap::with_capacity(unique.len()),
            batches: batches.len(),
            ..DetailReport::default()
        };

        for (idx, batch) in batches.iter().enumerate() {
            debug!(batch = idx + 1, of = batches.len(), size = batch.len(), "fetching detail batch");
            self.run_batch(batch, &mut report).await?;

            if idx + 1 < batches.len() {
                tokio::time::sleep(self.plan.pause).await;
            }
        }

        Ok(report)
    }

    async fn run_batch(&self, batch: &[FixtureId], report: &mut DetailReport) -> Result<(), RefreshError> {
        let mut set = JoinSet::new();
        for &id in batch {
            let source = Arc::clone(&self.source);
            set.spawn(async move {
                let (stats_path, events_path) = (statistics_path(id), events_path(id));
                let (stats, events) = tokio::join!(
                    fetch(source.as_ref(), &stats_path),
                    fetch(source.as_ref(), &events_path),
                );
                (id, stats, events)
            });
        }

        // Drain the whole batch even if one task died, so nothing is left running.
        let mut first_err = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((id, stats, events)) => {
                    report.failed_fetches += count_failed(&stats) + count_failed(&events);
                    report.details.insert(id, FixtureDetail {
                        stats:  stats.into_records(),
                        events: events.into_records(),
                    });
                }
                Err(e) => {
                    first_err.get_or_insert(RefreshError::from(e));
                }
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn count_failed(outcome: &FetchOutcome) -> usize {
    usize::from(outcome.is_failure())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockSource, Reply};
    use serde_json::json;

    fn fetcher(source: &Arc<MockSource>) -> DetailFetcher {
        DetailFetcher::new(source.clone(), BatchPlan::default())
    }

    #[tokio::test(start_paused = true)]
    async fn twelve_fixtures_run_in_batches_of_five_five_two() {
        let source = Arc::new(MockSource::new());
        let ids: Vec<FixtureId> = (1..=12).collect();

        let started = tokio::time::Instant::now();
        let report = fetcher(&source).fetch_details(&ids).await.unwrap();

        assert_eq!(report.batches, 3);
        assert_eq!(report.details.len(), 12);

        // group calls by the instant they were issued
        let mut groups: Vec<(Duration, usize)> = Vec::new();
        for (_, at) in source.calls() {
            let offset = at - started;
            match groups.iter_mut().find(|(o, _)| *o == offset) {
                Some((_, n)) => *n += 1,
                None => groups.push((offset, 1)),
            }
        }
        groups.sort();
        assert_eq!(
            groups,
            vec![
                (Duration::ZERO, 10),
                (Duration::from_millis(200), 10),
                (Duration::from_millis(400), 4),
            ]
        );

        // no pause after the last batch
        assert_eq!(started.elapsed(), Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn never_more_than_two_calls_per_batch_slot_in_flight() {
        let source = Arc::new(MockSource::with_latency(Duration::from_millis(50)));
        let ids: Vec<FixtureId> = (1..=12).collect();

        fetcher(&source).fetch_details(&ids).await.unwrap();

        assert_eq!(source.calls().len(), 24);
        assert_eq!(source.max_in_flight(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn single_batch_has_no_pause() {
        let source = Arc::new(MockSource::new());
        let started = tokio::time::Instant::now();

        let report = fetcher(&source).fetch_details(&[1, 2, 3]).await.unwrap();

        assert_eq!(report.batches, 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn failed_stats_for_one_fixture_leave_others_intact() {
        let source = Arc::new(MockSource::new());
        source.set(statistics_path(1), Reply::Fail);
        source.set(events_path(1), Reply::Records(vec![json!({"type": "Goal"})]));
        source.set(statistics_path(2), Reply::Records(vec![json!({"team": {"id": 9}})]));
        source.set(events_path(2), Reply::Records(vec![json!({"type": "Card"})]));

        let report = fetcher(&source).fetch_details(&[1, 2]).await.unwrap();

        assert_eq!(report.failed_fetches, 1);
        let x = &report.details[&1];
        assert!(x.stats.is_empty());
        assert_eq!(x.events, vec![json!({"type": "Goal"})]);
        let y = &report.details[&2];
        assert_eq!(y.stats, vec![json!({"team": {"id": 9}})]);
        assert_eq!(y.events, vec![json!({"type": "Card"})]);
    }

    #[tokio::test]
    async fn duplicate_ids_are_fetched_once() {
        let source = Arc::new(MockSource::new());
        let report = fetcher(&source).fetch_details(&[5, 5, 6]).await.unwrap();

        assert_eq!(report.details.len(), 2);
        assert_eq!(source.calls().len(), 4);
    }

    #[tokio::test]
    async fn panicking_fetch_is_a_task_error() {
        let source = Arc::new(MockSource::new());
        source.set(events_path(3), Reply::Panic);

        let err = fetcher(&source).fetch_details(&[1, 2, 3]).await.unwrap_err();
        assert!(matches!(err, RefreshError::Task(_)));
    }

    #[tokio::test]
    async fn zero_batch_size_is_clamped_to_one() {
        let source = Arc::new(MockSource::new());
        let fetcher = DetailFetcher::new(
            source.clone(),
            BatchPlan { batch_size: 0, pause: Duration::ZERO },
        );
        assert_eq!(fetcher.plan().batch_size, 1);

        let report = fetcher.fetch_details(&[1, 2]).await.unwrap();
        assert_eq!(report.batches, 2);
    }
}
