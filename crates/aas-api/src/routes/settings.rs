//! Simulation configuration and coordinates.

use aas_core::api::{ConfigResponse, CoordsResponse};
use aas_core::{ConfigUpdate, Coords};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Map, Value};
use tracing::info;

use crate::error::ApiResult;
use crate::server::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/config", get(config).patch(update_config))
        .route("/api/v1/config/coords", get(coords).patch(update_coords))
        .route("/api/v1/config/reset", post(reset_config))
        .route("/api/v1/config/defaults", get(defaults))
}

async fn config(State(app): State<AppState>) -> Json<ConfigResponse> {
    let state = app.simulation();
    Json(ConfigResponse {
        message: None,
        config: state.config(),
        coords: state.coords(),
    })
}

async fn update_config(
    State(app): State<AppState>,
    payload: Result<Json<ConfigUpdate>, JsonRejection>,
) -> ApiResult<Json<ConfigResponse>> {
    let Json(update) = payload?;
    let state = app.simulation();
    let config = state.update_config(&update)?;
    Ok(Json(ConfigResponse {
        message: Some("Configuration updated successfully".to_string()),
        config,
        coords: state.coords(),
    }))
}

async fn coords(State(app): State<AppState>) -> Json<Coords> {
    Json(app.simulation().coords())
}

async fn update_coords(
    State(app): State<AppState>,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> ApiResult<Json<CoordsResponse>> {
    let Json(updates) = payload?;
    let coords = app.simulation().update_coords(&updates);
    info!(updated = updates.len(), "Coordinates updated");
    Ok(Json(CoordsResponse {
        message: "Coordinates updated successfully".to_string(),
        coords,
    }))
}

async fn reset_config(State(app): State<AppState>) -> Json<ConfigResponse> {
    let (config, coords) = app.simulation().reset_config();
    info!("Configuration reset to defaults");
    Json(ConfigResponse {
        message: Some("Configuration reset to defaults".to_string()),
        config,
        coords,
    })
}

async fn defaults(State(app): State<AppState>) -> Json<ConfigResponse> {
    let state = app.simulation();
    Json(ConfigResponse {
        message: None,
        config: state.default_config().clone(),
        coords: state.default_coords().clone(),
    })
}
