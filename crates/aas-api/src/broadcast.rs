//! Event stream broadcaster.
//!
//! Serialises a simulation snapshot at a fixed interval and fans it out to
//! every `/api/v1/events` subscriber.

use std::sync::Arc;
use std::time::Duration;

use aas_engine::SimulationState;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Serialise the current snapshot for one `data:` line.
pub fn snapshot_json(state: &SimulationState) -> serde_json::Result<String> {
    serde_json::to_string(&state.event_snapshot())
}

/// Run the broadcaster task. Never returns; abort the task to stop it.
pub async fn run_broadcaster(
    state: Arc<SimulationState>,
    tx: broadcast::Sender<String>,
    interval_ms: u64,
) {
    let mut interval = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));

    loop {
        interval.tick().await;

        // No receivers is normal when no client is connected
        if tx.receiver_count() == 0 {
            continue;
        }

        match snapshot_json(&state) {
            Ok(json) => {
                if let Ok(n) = tx.send(json) {
                    trace!(receivers = n, "Snapshot broadcast");
                }
            }
            Err(e) => {
                debug!(error = %e, "Failed to serialize event snapshot");
            }
        }
    }
}
