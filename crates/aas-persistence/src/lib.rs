//! Persistence for the AAS simulation.
//!
//! The whole simulation state (devices, cumulative billing, individual
//! jobs, run history) lives in a single JSON document that is rewritten
//! atomically after every mutation. Run history can be exported as JSON
//! or CSV.

pub mod error;
pub mod export;
pub mod store;

pub use error::{PersistenceError, PersistenceResult};
pub use export::{export_filename, history_csv, history_json};
pub use store::{JsonStateStore, PersistedDevices, PersistedState, DEFAULT_STATE_FILE};
