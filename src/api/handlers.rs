use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Form, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::contracts::{CounterStore, PotError, StoreError};
use crate::engine::CounterEngine;
use crate::registry::PotRegistry;

/// Server metrics for monitoring.
#[derive(Default)]
pub struct Metrics {
    pub pots_created_total: AtomicU64,
    pub ids_issued_total: AtomicU64,
    pub reads_total: AtomicU64,
    pub errors_total: AtomicU64,
    pub issue_latency_sum_us: AtomicU64,
    pub start_time: std::sync::OnceLock<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        let m = Self::default();
        let _ = m.start_time.set(Instant::now());
        m
    }

    pub fn record_create(&self) {
        self.pots_created_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_issue(&self, latency_us: u64) {
        self.ids_issued_total.fetch_add(1, Ordering::Relaxed);
        self.issue_latency_sum_us
            .fetch_add(latency_us, Ordering::Relaxed);
    }

    pub fn record_read(&self) {
        self.reads_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors_total.fetch_add(1, Ordering::Relaxed);
    }
}

/// Application state shared across handlers.
pub struct AppState<S: CounterStore> {
    pub registry: PotRegistry<S>,
    pub engine: CounterEngine<S>,
    pub metrics: Arc<Metrics>,
}

impl<S: CounterStore> AppState<S> {
    pub fn new(store: Arc<S>, lock_timeout: Duration) -> Self {
        Self {
            registry: PotRegistry::with_lock_timeout(Arc::clone(&store), lock_timeout),
            engine: CounterEngine::new(store),
            metrics: Arc::new(Metrics::new()),
        }
    }
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// API error type.
pub enum ApiError {
    Pot(PotError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_response) = match self {
            ApiError::Pot(PotError::NotFound(pot)) => (
                StatusCode::NOT_FOUND,
                ErrorResponse {
                    error: format!("Pot not found: {}", pot),
                    code: "POT_NOT_FOUND".into(),
                },
            ),
            ApiError::Pot(PotError::AlreadyExists(pot)) => (
                StatusCode::CONFLICT,
                ErrorResponse {
                    error: format!("Pot already exists: {}", pot),
                    code: "POT_EXISTS".into(),
                },
            ),
            ApiError::Pot(PotError::InvalidName(msg)) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: format!("Invalid pot name: {}", msg),
                    code: "INVALID_NAME".into(),
                },
            ),
            ApiError::Pot(PotError::Store(StoreError::LockTimedOut(pot))) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse {
                    error: format!("Timed out waiting for creation lock on pot: {}", pot),
                    code: "LOCK_TIMEOUT".into(),
                },
            ),
            ApiError::Pot(PotError::Store(e)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    error: e.to_string(),
                    code: "STORE_ERROR".into(),
                },
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<PotError> for ApiError {
    fn from(e: PotError) -> Self {
        ApiError::Pot(e)
    }
}

/// Request body for creating a pot.
#[derive(Debug, Deserialize)]
pub struct CreatePotRequest {
    pub name: String,
    #[serde(default)]
    pub min: u64,
}

/// POST /pot/create
/// Create a new pot with its counter initialized to `min`.
pub async fn create_pot<S: CounterStore>(
    State(state): State<Arc<AppState<S>>>,
    Form(req): Form<CreatePotRequest>,
) -> Result<(StatusCode, &'static str), ApiError> {
    state
        .registry
        .create_pot(&req.name, req.min)
        .map_err(|e| {
            if let PotError::Store(ref store_err) = e {
                state.metrics.record_error();
                tracing::error!(pot = %req.name, error = %store_err, "failed to create pot");
            }
            ApiError::from(e)
        })?;

    state.metrics.record_create();
    Ok((StatusCode::CREATED, "Created new pot"))
}

/// GET /pot/{name}
/// Check whether a pot exists.
pub async fn check_pot<S: CounterStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    let exists = state.registry.exists(&name).map_err(|e| {
        state.metrics.record_error();
        tracing::error!(pot = %name, error = %e, "existence probe failed");
        ApiError::from(e)
    })?;

    if exists {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(PotError::NotFound(name).into())
    }
}

/// GET /id/{name}
/// Read the pot's current counter value without advancing it.
/// The value is returned as plain decimal text.
pub async fn current_id<S: CounterStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(name): Path<String>,
) -> Result<String, ApiError> {
    let value = state.engine.current_value(&name).map_err(|e| {
        if let PotError::Store(ref store_err) = e {
            state.metrics.record_error();
            tracing::error!(pot = %name, error = %store_err, "failed to read current id");
        }
        ApiError::from(e)
    })?;

    state.metrics.record_read();
    Ok(value.to_string())
}

/// POST /id/{name}
/// Allocate the next value from the pot: advance the counter by exactly 1
/// and return the new value as plain decimal text.
pub async fn next_id<S: CounterStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(name): Path<String>,
) -> Result<String, ApiError> {
    let start = Instant::now();

    let value = state.engine.increment(&name).map_err(|e| {
        if let PotError::Store(ref store_err) = e {
            state.metrics.record_error();
            tracing::error!(pot = %name, error = %store_err, "failed to allocate next id");
        }
        ApiError::from(e)
    })?;

    state
        .metrics
        .record_issue(start.elapsed().as_micros() as u64);
    Ok(value.to_string())
}

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy"
    }))
}

/// Response for stats endpoint.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub uptime_secs: f64,
    pub pots_created_total: u64,
    pub ids_issued_total: u64,
    pub reads_total: u64,
    pub errors_total: u64,
    pub issue_rate_per_sec: f64,
    pub avg_issue_latency_us: f64,
}

/// GET /stats
/// Server statistics and metrics.
pub async fn get_stats<S: CounterStore>(
    State(state): State<Arc<AppState<S>>>,
) -> impl IntoResponse {
    let metrics = &state.metrics;

    let uptime_secs = metrics
        .start_time
        .get()
        .map(|t| t.elapsed().as_secs_f64())
        .unwrap_or(0.0);

    let ids_issued = metrics.ids_issued_total.load(Ordering::Relaxed);
    let issue_latency_sum = metrics.issue_latency_sum_us.load(Ordering::Relaxed);

    Json(StatsResponse {
        uptime_secs,
        pots_created_total: metrics.pots_created_total.load(Ordering::Relaxed),
        ids_issued_total: ids_issued,
        reads_total: metrics.reads_total.load(Ordering::Relaxed),
        errors_total: metrics.errors_total.load(Ordering::Relaxed),
        issue_rate_per_sec: safe_rate(ids_issued, uptime_secs),
        avg_issue_latency_us: safe_avg(issue_latency_sum, ids_issued),
    })
}

fn safe_rate(count: u64, secs: f64) -> f64 {
    if secs > 0.0 {
        count as f64 / secs
    } else {
        0.0
    }
}

fn safe_avg(sum: u64, count: u64) -> f64 {
    if count > 0 {
        sum as f64 / count as f64
    } else {
        0.0
    }
}
