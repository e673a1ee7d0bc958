//! aas-api - HTTP API of the AAS factory simulation.
//!
//! Serves the `/api/v1` contract consumed by the dashboard:
//!
//! - AAS device submodels and billing views
//! - Job queue, cycle runs and predefined scenarios
//! - Simulation configuration
//! - Run history with JSON/CSV export
//! - Job composer (direct and batch submissions)
//! - Server-sent event stream of live state (`/api/v1/events`)
//!
//! ```ignore
//! use aas_api::{run_server, ApiConfig};
//!
//! let runs = RunManager::new(Arc::new(SimulationState::in_memory()));
//! run_server(runs, ApiConfig::default(), shutdown_signal()).await?;
//! ```

mod broadcast;
mod config;
mod error;
mod routes;
mod server;

pub use broadcast::{run_broadcaster, snapshot_json};
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use server::{create_router, run_server, AppState, ConnectionGuard, ConnectionLimiter};
