//! Prometheus metrics and structured logging for the AAS simulation.
//!
//! - Structured logging with tracing (pretty in development, JSON in production)
//! - Prometheus counters for cycles, processed jobs and billed usage
//! - Text exposition for the `/metrics` endpoint

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
