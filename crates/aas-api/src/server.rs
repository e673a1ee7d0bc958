//! HTTP server implementation using axum.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use aas_engine::{RunManager, SimulationState};
use axum::http::HeaderValue;
use axum::Router;
use tokio::sync::broadcast;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ApiConfig;
use crate::routes;

/// Caps concurrent event stream subscribers.
#[derive(Debug)]
pub struct ConnectionLimiter {
    current: AtomicUsize,
    max: usize,
}

impl ConnectionLimiter {
    pub fn new(max: usize) -> Self {
        Self {
            current: AtomicUsize::new(0),
            max,
        }
    }

    /// Take a slot, or `None` when all `max` slots are in use. The slot is
    /// released when the guard drops, which may be long after the handler
    /// returned since the guard lives inside the response stream.
    pub fn try_acquire(self: &Arc<Self>) -> Option<ConnectionGuard> {
        loop {
            let current = self.current.load(Ordering::Acquire);
            if current >= self.max {
                return None;
            }
            if self
                .current
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(ConnectionGuard {
                    limiter: Arc::clone(self),
                });
            }
        }
    }

    pub fn current_count(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }

    pub fn max(&self) -> usize {
        self.max
    }
}

#[derive(Debug)]
pub struct ConnectionGuard {
    limiter: Arc<ConnectionLimiter>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.limiter.current.fetch_sub(1, Ordering::Release);
    }
}

/// Shared application state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub(crate) runs: RunManager,
    pub(crate) broadcast_tx: broadcast::Sender<String>,
    pub(crate) connection_limiter: Arc<ConnectionLimiter>,
    pub(crate) config: ApiConfig,
}

impl AppState {
    pub fn new(runs: RunManager, broadcast_tx: broadcast::Sender<String>, config: ApiConfig) -> Self {
        Self {
            runs,
            broadcast_tx,
            connection_limiter: Arc::new(ConnectionLimiter::new(config.max_event_connections)),
            config,
        }
    }

    pub fn simulation(&self) -> &Arc<SimulationState> {
        self.runs.state()
    }

    pub fn runs(&self) -> &RunManager {
        &self.runs
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }
}

/// Create the axum router.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    Router::new()
        .merge(routes::service::router())
        .merge(routes::aas::router())
        .merge(routes::queue::router())
        .merge(routes::cycle::router())
        .merge(routes::settings::router())
        .merge(routes::history::router())
        .merge(routes::composer::router())
        .merge(routes::events::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(AllowOrigin::any());
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

/// Run the API server until `shutdown` resolves.
pub async fn run_server<F>(runs: RunManager, config: ApiConfig, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    // One snapshot per interval; 32 messages of backlog for slow subscribers
    let (broadcast_tx, _) = broadcast::channel::<String>(32);

    let state = AppState::new(runs.clone(), broadcast_tx.clone(), config.clone());
    let app = create_router(state);

    let broadcaster = tokio::spawn(crate::broadcast::run_broadcaster(
        Arc::clone(runs.state()),
        broadcast_tx,
        config.event_interval_ms,
    ));

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Starting AAS simulation API");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await;

    broadcaster.abort();
    info!("AAS simulation API stopped");
    served
}
