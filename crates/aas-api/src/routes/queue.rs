//! Job queue management.

use aas_core::api::{EnqueueJobRequest, EnqueueJobResponse, QueueChangeResponse, QueueResponse};
use aas_engine::EngineError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/queue", get(queue).delete(clear_queue))
        .route("/api/v1/queue/enqueue", post(enqueue))
        .route("/api/v1/queue/{order_no}", delete(remove_job))
}

async fn enqueue(
    State(app): State<AppState>,
    payload: Result<Json<EnqueueJobRequest>, JsonRejection>,
) -> ApiResult<Json<EnqueueJobResponse>> {
    let Json(job) = payload?;
    if job.order_no.is_empty() {
        return Err(ApiError::Unprocessable("orderNo must not be empty".to_string()));
    }
    if job.laser_text.is_empty() {
        return Err(ApiError::Unprocessable("laserText must not be empty".to_string()));
    }

    let order_no = job.order_no.clone();
    let site = job.site.clone();
    let queue_length = app.simulation().enqueue(job).map_err(|e| match e {
        EngineError::InvalidSite { site, available } => ApiError::BadRequest(format!(
            "Invalid site '{site}'. Available sites: {available:?}"
        )),
        other => other.into(),
    })?;
    info!(order_no = %order_no, site = %site, queue_length, "Job enqueued");

    Ok(Json(EnqueueJobResponse {
        message: "Job enqueued successfully".to_string(),
        order_no,
        site,
        queue_length,
    }))
}

async fn queue(State(app): State<AppState>) -> Json<QueueResponse> {
    let queue = app.simulation().queue_jobs();
    Json(QueueResponse {
        length: queue.len(),
        queue,
    })
}

async fn remove_job(
    State(app): State<AppState>,
    Path(order_no): Path<String>,
) -> ApiResult<Json<QueueChangeResponse>> {
    let queue_length = app.simulation().remove_job(&order_no)?;
    Ok(Json(QueueChangeResponse {
        message: format!("Job {order_no} removed from queue"),
        queue_length,
    }))
}

async fn clear_queue(State(app): State<AppState>) -> Json<QueueChangeResponse> {
    let cleared = app.simulation().clear_queue();
    Json(QueueChangeResponse {
        message: format!("Queue cleared, {cleared} jobs removed"),
        queue_length: 0,
    })
}
