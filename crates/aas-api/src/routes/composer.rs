//! Job composer: user submissions and synchronous scenario runs.

use aas_core::api::{
    BatchJobRequest, BatchJobResponse, DirectJobRequest, DirectJobResponse, ScenarioRunResponse,
    ValidationResponse,
};
use aas_core::validate_order_format;
use aas_engine::{EngineError, Scenario};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

const ORDER_FORMAT: &str = "X-NNNN (e.g., E-1001)";

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/composer/direct", post(direct))
        .route("/api/v1/composer/batch", post(batch))
        .route("/api/v1/composer/scenario1", post(scenario_1))
        .route("/api/v1/composer/scenario2", post(scenario_2))
        .route("/api/v1/composer/validate-order/{order_no}", get(validate_order))
}

/// Request validation keeps its own status; anything else is reported as a
/// failure of `action`.
fn composer_error(action: &str, e: EngineError) -> ApiError {
    match e {
        EngineError::Core(core) => core.into(),
        other => ApiError::Failed(format!("{action}: {other}")),
    }
}

async fn direct(
    State(app): State<AppState>,
    payload: Result<Json<DirectJobRequest>, JsonRejection>,
) -> ApiResult<Json<DirectJobResponse>> {
    let Json(request) = payload?;
    app.runs()
        .submit_direct(&request)
        .map(Json)
        .map_err(|e| composer_error("Failed to start direct job", e))
}

async fn batch(
    State(app): State<AppState>,
    payload: Result<Json<BatchJobRequest>, JsonRejection>,
) -> ApiResult<Json<BatchJobResponse>> {
    let Json(request) = payload?;
    app.runs()
        .submit_batch(&request)
        .map(Json)
        .map_err(|e| composer_error("Failed to start batch jobs", e))
}

async fn scenario_1(State(app): State<AppState>) -> ApiResult<Json<ScenarioRunResponse>> {
    app.runs()
        .run_scenario_now(Scenario::SameSite)
        .await
        .map(Json)
        .map_err(|e| ApiError::Failed(format!("Failed to execute scenario 1: {e}")))
}

async fn scenario_2(State(app): State<AppState>) -> ApiResult<Json<ScenarioRunResponse>> {
    app.runs()
        .run_scenario_now(Scenario::TwoSites)
        .await
        .map(Json)
        .map_err(|e| ApiError::Failed(format!("Failed to execute scenario 2: {e}")))
}

async fn validate_order(Path(order_no): Path<String>) -> Json<ValidationResponse> {
    let valid = validate_order_format(&order_no);
    let message = if valid {
        "Valid order number".to_string()
    } else {
        format!("Invalid format. Use {ORDER_FORMAT}")
    };
    Json(ValidationResponse {
        order_no,
        valid,
        format: ORDER_FORMAT.to_string(),
        message,
    })
}
