//! HTTP surface of the daemon: liveness, readiness and metrics.

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::collections::BTreeMap;
use ticket_sync_runtime::{HealthCheck, MetricsExporter, SyncScheduler};

/// Shared state for request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The running sync scheduler
    pub scheduler: SyncScheduler,
    /// Prometheus exporter, if this process installed the recorder
    pub metrics: Option<MetricsExporter>,
}

/// Liveness response
#[derive(Serialize)]
pub struct HealthResponse {
    /// Always "ok" while the process serves requests
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
}

/// Readiness response
#[derive(Serialize)]
pub struct ReadinessResponse {
    /// True once a complete sync cycle has finished
    pub ready: bool,
    /// Scheduler health status
    pub status: String,
    /// Detail message, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Extra health fields
    pub details: BTreeMap<String, String>,
}

impl ReadinessResponse {
    fn new(ready: bool, check: HealthCheck) -> Self {
        Self {
            ready,
            status: check.status.to_string(),
            message: check.message,
            details: check.metadata.into_iter().collect(),
        }
    }
}

/// Liveness check.
///
/// Returns 200 whenever the process is up.
pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

/// Readiness check.
///
/// Returns 200 once the scheduler has completed a full cycle against the
/// current source, 503 otherwise.
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let ready = state.scheduler.is_ready();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(ReadinessResponse::new(ready, state.scheduler.health())))
}

/// Prometheus scrape endpoint.
pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.as_ref().and_then(MetricsExporter::render) {
        Some(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics))
        .with_state(state)
}
