//! Service endpoints: index, health and Prometheus metrics.

use aas_core::api::HealthResponse;
use aas_telemetry::Metrics;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

pub(crate) const API_VERSION: &str = "1.0.0";

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "AAS Simulation API",
        "version": API_VERSION,
        "docs": "/docs",
        "endpoints": {
            "devices": "/api/v1/aas/devices",
            "queue": "/api/v1/queue",
            "run_cycle": "/api/v1/cycle/run",
            "configuration": "/api/v1/config",
            "history": "/api/v1/history",
            "events_sse": "/api/v1/events",
        }
    }))
}

async fn health(State(app): State<AppState>) -> Json<HealthResponse> {
    Json(app.simulation().health())
}

async fn metrics() -> ApiResult<impl IntoResponse> {
    let body = Metrics::render().map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
