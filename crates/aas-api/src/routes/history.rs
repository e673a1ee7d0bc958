//! Run history, statistics and export.

use aas_core::api::{HistoryClearedResponse, HistoryListResponse, HistoryStats, RunRecord};
use aas_core::local_now_iso;
use aas_engine::history::{self, DEFAULT_HISTORY_LIMIT};
use aas_persistence::{export_filename, history_csv, history_json};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/history", get(list).delete(clear))
        .route("/api/v1/history/{run_id}", get(run_details))
        .route("/api/v1/history/export/json", get(export_json))
        .route("/api/v1/history/export/csv", get(export_csv))
        .route("/api/v1/history/summary/stats", get(summary_stats))
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

async fn list(
    State(app): State<AppState>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> ApiResult<Json<HistoryListResponse>> {
    let Query(query) = query?;
    let runs = app.simulation().runs();
    let total = runs.len();
    let history = history::newest_first(runs, Some(query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT)));
    Ok(Json(HistoryListResponse {
        showing: history.len(),
        total,
        history,
    }))
}

async fn run_details(
    State(app): State<AppState>,
    Path(run_id): Path<String>,
) -> ApiResult<Json<RunRecord>> {
    Ok(Json(app.simulation().run(&run_id)?))
}

fn attachment(content_type: &'static str, ext: &str, body: String) -> Response {
    let disposition = format!(
        "attachment; filename={}",
        export_filename(ext, &chrono::Local::now())
    );
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}

async fn export_json(
    State(app): State<AppState>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(query) = query?;
    let runs = app.simulation().runs();
    let total = runs.len();
    let exported = history::newest_first(runs, query.limit);
    let body = history_json(&exported, total, &local_now_iso())
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(attachment("application/json", "json", body))
}

async fn export_csv(
    State(app): State<AppState>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(query) = query?;
    let exported = history::newest_first(app.simulation().runs(), query.limit);
    Ok(attachment("text/csv", "csv", history_csv(&exported)))
}

async fn clear(State(app): State<AppState>) -> Json<HistoryClearedResponse> {
    let cleared = app.simulation().clear_history();
    info!(cleared, "Run history cleared");
    Json(HistoryClearedResponse {
        message: format!("History cleared, {cleared} runs removed"),
        total_runs: 0,
    })
}

async fn summary_stats(State(app): State<AppState>) -> Json<HistoryStats> {
    Json(history::stats(&app.simulation().runs()))
}
