//! AAS device submodels and billing views.

use aas_core::api::{CombinedBillingResponse, DevicesResponse, IndividualJobsResponse, SuccessResponse};
use aas_core::{DeviceBilling, DeviceKind, JobSource, OrderModel, PoseModel, StatusModel};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use crate::error::ApiResult;
use crate::server::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/aas/devices", get(devices))
        .route("/api/v1/aas/{device}/operational/status", get(operational_status))
        .route("/api/v1/aas/{device}/operational/order", get(operational_order))
        .route("/api/v1/aas/{device}/operational/pose", get(operational_pose))
        .route("/api/v1/aas/{device}/billing", get(billing))
        .route("/api/v1/aas/combined-billing", get(combined_billing))
        .route("/api/v1/aas/individual-jobs", get(individual_jobs))
        .route("/api/v1/aas/reset-user-billing", post(reset_user_billing))
}

async fn devices(State(app): State<AppState>) -> Json<DevicesResponse> {
    let state = app.simulation();
    Json(DevicesResponse {
        engraver: state.engraver(),
        agv: state.agv(),
    })
}

async fn operational_status(
    State(app): State<AppState>,
    Path(device): Path<String>,
) -> ApiResult<Json<StatusModel>> {
    let kind: DeviceKind = device.parse()?;
    let device = app.simulation().device(kind);
    Ok(Json(device.operational_data().status.clone()))
}

async fn operational_order(
    State(app): State<AppState>,
    Path(device): Path<String>,
) -> ApiResult<Json<OrderModel>> {
    let kind: DeviceKind = device.parse()?;
    let device = app.simulation().device(kind);
    Ok(Json(device.operational_data().order.clone()))
}

async fn operational_pose(
    State(app): State<AppState>,
    Path(device): Path<String>,
) -> ApiResult<Json<PoseModel>> {
    let kind: DeviceKind = device.parse()?;
    Ok(Json(app.simulation().device(kind).operational_data().pose))
}

async fn billing(
    State(app): State<AppState>,
    Path(device): Path<String>,
) -> ApiResult<Json<DeviceBilling>> {
    let kind: DeviceKind = device.parse()?;
    Ok(Json(app.simulation().device(kind).billing()))
}

async fn combined_billing(State(app): State<AppState>) -> Json<CombinedBillingResponse> {
    Json(app.simulation().combined_billing())
}

#[derive(Debug, Deserialize)]
struct SourceQuery {
    source: Option<String>,
}

async fn individual_jobs(
    State(app): State<AppState>,
    query: Result<Query<SourceQuery>, QueryRejection>,
) -> ApiResult<Json<IndividualJobsResponse>> {
    let Query(query) = query?;
    let report = match query.source.as_deref().filter(|s| !s.is_empty()) {
        None => app.simulation().individual_jobs_report(None),
        // An unknown source matches no job
        Some(source) => match source.parse::<JobSource>() {
            Ok(source) => app.simulation().individual_jobs_report(Some(source)),
            Err(_) => IndividualJobsResponse::from_jobs(Vec::new()),
        },
    };
    Ok(Json(report))
}

async fn reset_user_billing(State(app): State<AppState>) -> Json<SuccessResponse> {
    app.simulation().reset_user_billing();
    info!("User job billing reset");
    Json(SuccessResponse {
        success: true,
        message: "User job billing reset successfully".to_string(),
    })
}
