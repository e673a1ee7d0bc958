//! Server-sent event stream of live simulation state.

use std::convert::Infallible;

use aas_core::api::EventsTestResponse;
use aas_core::local_now_iso;
use aas_telemetry::Metrics;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::stream::{self, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::broadcast::snapshot_json;
use crate::error::{ApiError, ApiResult};
use crate::server::{AppState, ConnectionGuard};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/events", get(stream_events))
        .route("/api/v1/events/test", get(test_events))
}

/// One connected subscriber. Holds its connection slot until dropped.
struct Subscription {
    rx: broadcast::Receiver<String>,
    _guard: ConnectionGuard,
}

impl Subscription {
    /// Next broadcast payload, or `None` once the broadcaster is gone.
    async fn next_payload(&mut self) -> Option<String> {
        loop {
            match self.rx.recv().await {
                Ok(json) => return Some(json),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "Event subscriber lagged, catching up");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Broadcast channel closed");
                    return None;
                }
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        Metrics::sse_disconnected();
        info!("Event stream connection closed");
    }
}

async fn stream_events(State(app): State<AppState>) -> ApiResult<impl IntoResponse> {
    let limiter = &app.connection_limiter;
    let guard = limiter.try_acquire().ok_or_else(|| {
        warn!(
            current = limiter.current_count(),
            max = limiter.max(),
            "Event stream connection limit reached"
        );
        ApiError::Unavailable("Too many event stream connections".to_string())
    })?;

    // Subscribe before the first snapshot so no update is missed in between
    let rx = app.broadcast_tx.subscribe();
    let initial = snapshot_json(app.simulation()).map_err(|e| ApiError::Internal(e.to_string()))?;

    Metrics::sse_connected();
    info!(connections = limiter.current_count(), "New event stream connection");

    let subscription = Subscription { rx, _guard: guard };
    let first = stream::once(async move { Ok::<Event, Infallible>(Event::default().data(initial)) });
    let updates = stream::unfold(subscription, |mut sub| async move {
        let payload = sub.next_payload().await?;
        Some((Ok::<Event, Infallible>(Event::default().data(payload)), sub))
    });

    Ok(Sse::new(first.chain(updates)).keep_alive(KeepAlive::default()))
}

async fn test_events() -> Json<EventsTestResponse> {
    Json(EventsTestResponse {
        message: "SSE endpoint is available".to_string(),
        endpoint: "/api/v1/events".to_string(),
        timestamp: local_now_iso(),
    })
}
