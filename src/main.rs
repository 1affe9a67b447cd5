/// LiveCache — Live Fixture Cache Server
///
/// What it does:
///   1. Every FETCH_INTERVAL_SECS pulls live fixtures from API-Football
///   2. Fetches statistics + events per fixture in batches of DETAIL_BATCH_SIZE
///   3. Publishes the result as one snapshot; every client reads from RAM
///   4. Proxies /ai-analysis so the AI key never leaves the server
///
/// Endpoints: GET /live, GET /health, POST /ai-analysis, GET / (dashboard)
///
/// Run:
///   API_FOOTBALL_KEY=... cargo run --bin live-cache

use anyhow::{Context, Result};
use dotenv::dotenv;
use fixture_cache::{spawn_scheduler, ApiFootballClient, CacheStore, RefreshCycle};
use logger::{now_iso, EventLogger, ServiceStartEvent};
use std::env;
use std::fs::File;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod ai_proxy;
mod config;
mod http;

use crate::ai_proxy::AiProxy;
use crate::config::Config;
use crate::http::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    // A panic inside a cycle or handler task only kills that task; log it and keep serving.
    std::panic::set_hook(Box::new(|info| {
        error!("unexpected panic: {info}");
    }));

    let config = Config::from_env()?;

    // Single instance lock (per port)
    let lock_file_path = env::temp_dir().join(format!("live_cache_{}.lock", config.bind.port()));
    let lock_file = File::create(&lock_file_path)
        .with_context(|| format!("Failed to create lock file at {:?}", lock_file_path))?;

    let mut lock = fd_lock::RwLock::new(lock_file);
    let _write_guard = match lock.try_write() {
        Ok(guard) => guard,
        Err(_) => {
            warn!("Another live-cache instance is already running on port {}! Exiting.", config.bind.port());
            return Ok(());
        }
    };

    let events = Arc::new(EventLogger::new(&config.log_dir));

    let source = Arc::new(
        ApiFootballClient::new(
            config.upstream.base_url.clone(),
            config.upstream.api_key.clone(),
            config.upstream.timeout,
        )
        .context("failed to create API-Football client")?,
    );

    let store = Arc::new(CacheStore::new());
    let cycle = Arc::new(
        RefreshCycle::new(source, Arc::clone(&store), config.plan)
            .with_event_log(Arc::clone(&events)),
    );

    let ai = AiProxy::new(&config.ai)?;
    if !ai.is_enabled() {
        warn!("ANTHROPIC_API_KEY not set, /ai-analysis will answer 503");
    }

    let _ = events.log(&ServiceStartEvent {
        ts:                  now_iso(),
        event:               "SERVICE_START",
        bind:                config.bind.to_string(),
        fetch_interval_secs: config.fetch_interval.as_secs(),
        batch_size:          config.plan.batch_size,
        batch_pause_ms:      config.plan.pause.as_millis() as u64,
        ai_proxy_enabled:    ai.is_enabled(),
    });

    let listener = TcpListener::bind(config.bind).await.context("bind failed")?;

    info!("=== LiveCache started ===");
    info!("Port     : {}", config.bind.port());
    info!("Endpoint : http://localhost:{}/live", config.bind.port());
    info!("Health   : http://localhost:{}/health", config.bind.port());
    info!(
        "Refresh  : every {}s, batches of {} with {}ms pause",
        config.fetch_interval.as_secs(),
        config.plan.batch_size,
        config.plan.pause.as_millis()
    );

    let scheduler = spawn_scheduler(cycle, config.fetch_interval);

    let state = Arc::new(AppState::new(store, ai, config.dashboard_path.clone()));
    let served = axum::serve(listener, http::router(state, config.ai.body_limit)).await;

    scheduler.abort();
    served.context("http server stopped")
}
