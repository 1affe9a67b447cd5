//! HTTP surface: /live, /health, /ai-analysis, dashboard, CORS.

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::{Method, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use fixture_cache::{assemble_health, assemble_live_view, CacheStore, HealthView, LiveView};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::ai_proxy::{AiProxy, ProxyError};

pub struct AppState {
    pub store:     Arc<CacheStore>,
    pub ai:        AiProxy,
    pub dashboard: PathBuf,
    pub started:   Instant,
}

impl AppState {
    pub fn new(store: Arc<CacheStore>, ai: AiProxy, dashboard: PathBuf) -> Self {
        Self {
            store,
            ai,
            dashboard,
            started: Instant::now(),
        }
    }
}

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ApiError {
    status:  StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not found")
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

impl From<ProxyError> for ApiError {
    fn from(err: ProxyError) -> Self {
        match &err {
            ProxyError::NotConfigured => Self::new(StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
            _ => {
                warn!(error = %err, "AI proxy failed");
                Self::new(StatusCode::BAD_GATEWAY, "AI upstream failed")
            }
        }
    }
}

// ── Router ───────────────────────────────────────────────────────────────────

pub fn router(state: Arc<AppState>, ai_body_limit: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(Duration::from_secs(86_400));

    Router::new()
        .route("/live", get(live))
        .route("/health", get(health))
        .route("/ai-analysis", post(ai_analysis).layer(DefaultBodyLimit::max(ai_body_limit)))
        .route("/", get(dashboard))
        .route("/dashboard", get(dashboard))
        .fallback(fallback)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn live(State(state): State<Arc<AppState>>) -> Json<LiveView> {
    Json(assemble_live_view(&state.store))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthView> {
    Json(assemble_health(&state.store, state.started.elapsed()))
}

#[derive(Serialize)]
struct AiAnswer {
    text: String,
}

async fn ai_analysis(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<AiAnswer>, ApiError> {
    let body = body.map_err(|rejection| {
        debug!("ai-analysis body rejected: {}", rejection.body_text());
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
        } else {
            ApiError::bad_request("Could not read request body")
        }
    })?;

    let prompt = extract_prompt(&body)?;
    let text = state.ai.complete(&prompt).await?;
    Ok(Json(AiAnswer { text }))
}

fn extract_prompt(body: &[u8]) -> Result<String, ApiError> {
    let parsed: Value = serde_json::from_slice(body)
        .map_err(|_| ApiError::bad_request("Body must be JSON"))?;

    match parsed.get("prompt") {
        Some(Value::String(p)) if !p.trim().is_empty() => Ok(p.clone()),
        Some(Value::String(_)) => Err(ApiError::bad_request("prompt is empty")),
        Some(_) => Err(ApiError::bad_request("prompt must be a string")),
        None => Err(ApiError::bad_request("prompt is required")),
    }
}

async fn dashboard(State(state): State<Arc<AppState>>) -> Result<Html<String>, ApiError> {
    match tokio::fs::read_to_string(&state.dashboard).await {
        Ok(page) => Ok(Html(page)),
        Err(e) => {
            debug!("dashboard {:?} unavailable: {}", state.dashboard, e);
            Err(ApiError::not_found())
        }
    }
}

async fn fallback() -> ApiError {
    ApiError::not_found()
}
