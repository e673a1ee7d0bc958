//! AAS simulation server and terminal dashboard.
//!
//! - `aas-sim`: runs the simulation engine behind the HTTP API
//! - `aas-dash`: terminal dashboard talking to a running server

pub mod config;
pub mod error;
pub mod render;

pub use config::{AppConfig, DEFAULT_CONFIG_PATH};
pub use error::{AppError, AppResult};
