//! LiveCache — Fixture Cache
//!
//! Refresh engine for the live-fixture cache:
//!   1. `upstream`     — API-Football client, every failure normalized to "no data"
//!   2. `orchestrator` — per-fixture statistics + events in bounded batches
//!   3. `refresh`      — the periodic cycle, guarded against overlap
//!   4. `store`        — atomically published snapshot, read lock-free
//!   5. `assembler`    — joins fixtures with details for readers
//!
//! Readers only ever see a fully published snapshot.

pub mod assembler;
pub mod orchestrator;
pub mod refresh;
pub mod store;
pub mod types;
pub mod upstream;

pub use assembler::{assemble_health, assemble_live_view, live_view, HealthView, LiveFixture, LiveView};
pub use orchestrator::{BatchPlan, DetailFetcher, DetailReport};
pub use refresh::{spawn_scheduler, CycleOutcome, RefreshCycle, RefreshError};
pub use store::{CacheStore, RefreshGuard};
pub use types::{CacheSnapshot, Fixture, FixtureDetail, FixtureId};
pub use upstream::{fetch, ApiFootballClient, FetchOutcome, FixtureSource, UpstreamError};

#[cfg(test)]
pub(crate) mod testing;
