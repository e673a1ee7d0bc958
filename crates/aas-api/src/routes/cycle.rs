//! Cycle runs and predefined scenarios.

use aas_core::api::{CycleStartResponse, CycleStatusResponse, RunRecord, ScenarioStartResponse};
use aas_core::JOB_POS1;
use aas_engine::Scenario;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::server::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/cycle/status", get(current_status))
        .route("/api/v1/cycle/status/{run_id}", get(run_status))
        .route("/api/v1/cycle/run", post(run_cycle))
        .route("/api/v1/cycle/scenario1", post(scenario_1))
        .route("/api/v1/cycle/scenario2", post(scenario_2))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunCycleQuery {
    site: Option<String>,
    /// A job count, or `all`.
    max_jobs: Option<String>,
}

/// `all`, empty or non-numeric values mean no limit.
fn parse_max_jobs(raw: Option<&str>) -> Option<usize> {
    raw.and_then(|s| s.parse::<usize>().ok())
}

async fn run_cycle(
    State(app): State<AppState>,
    query: Result<Query<RunCycleQuery>, QueryRejection>,
) -> ApiResult<Json<CycleStartResponse>> {
    let Query(query) = query?;
    let site = query.site.unwrap_or_else(|| JOB_POS1.to_string());
    let max_jobs = parse_max_jobs(query.max_jobs.as_deref());
    Ok(Json(app.runs().start_cycle(&site, max_jobs)?))
}

async fn run_status(
    State(app): State<AppState>,
    Path(run_id): Path<String>,
) -> ApiResult<Json<RunRecord>> {
    Ok(Json(app.simulation().run(&run_id)?))
}

async fn current_status(State(app): State<AppState>) -> Json<CycleStatusResponse> {
    Json(app.simulation().cycle_status())
}

async fn scenario_1(State(app): State<AppState>) -> Json<ScenarioStartResponse> {
    Json(app.runs().start_scenario(Scenario::SameSite))
}

async fn scenario_2(State(app): State<AppState>) -> Json<ScenarioStartResponse> {
    Json(app.runs().start_scenario(Scenario::TwoSites))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_max_jobs() {
        assert_eq!(parse_max_jobs(None), None);
        assert_eq!(parse_max_jobs(Some("all")), None);
        assert_eq!(parse_max_jobs(Some("2")), Some(2));
        assert_eq!(parse_max_jobs(Some("-1")), None);
    }
}
