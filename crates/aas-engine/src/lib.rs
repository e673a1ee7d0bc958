//! Simulation engine for the AAS factory.
//!
//! An AGV shuttles between its home position, the engraver dock and two job
//! sites while a laser engraver processes queued jobs. Only the
//! dock -> site -> dock legs are billed; engraver energy is billed per job.
//!
//! - `state`: Shared simulation state with JSON persistence
//! - `orchestrator`: AGV legs, engraving and the billing window
//! - `runs`: Background cycles, composer runs and scenarios
//! - `history`: Run history ordering and statistics

pub mod error;
pub mod history;
pub mod kinematics;
pub mod orchestrator;
pub mod rules;
pub mod runs;
pub mod state;

pub use error::{EngineError, EngineResult};
pub use rules::Scenario;
pub use runs::RunManager;
pub use state::SimulationState;
