//! Core domain types for the AAS factory simulation.
//!
//! This crate is shared by the simulation backend and the dashboard client:
//! - `device`: Asset Administration Shell submodels for the engraver and AGV
//! - `sim_config`: Billing rates, kinematics and coordinate system
//! - `billing`: Cumulative billing buckets and per-job records
//! - `orders`: Queue jobs and order number conventions
//! - `validation`: Laser text and batch composer rules
//! - `time`: ISO8601 timestamp helpers
//! - `format`: Currency and timestamp rendering for display
//! - `api`: Request and response bodies of the `/api/v1` contract

pub mod api;
pub mod billing;
pub mod device;
pub mod error;
pub mod format;
pub mod orders;
pub mod sim_config;
pub mod time;
pub mod validation;

pub use billing::{
    round6, BillingTotals, CumulativeBilling, IndividualJob, IndividualJobsSummary, JobDetails,
    JobSource, UsageDelta,
};
pub use device::{
    AgvBilling, AgvDevice, BillingStatus, Device, DeviceBilling, DeviceKind, EngraverBilling,
    EngraverDevice, OperationMode, OperationalData, OrderModel, OrderState, OrderType, PoseModel,
    StatusModel, AGV_ID, ENGRAVER_ID,
};
pub use error::{CoreError, Result};
pub use format::{format_currency, format_decimal, format_progress, format_time, format_timestamp};
pub use orders::{batch_order_number, generate_order_number, validate_order_format, QueueJob};
pub use sim_config::{
    default_coords, AgvConfig, AgvConfigUpdate, ConfigUpdate, Coords, EngraverConfig,
    EngraverConfigUpdate, SimConfig, ENGRAVER_DOCK, HOME, JOB_POS1, JOB_POS2,
};
pub use time::{local_now_iso, local_stamp, now_iso};
pub use validation::{validate_laser_text, BatchDraft, ComposerSite, TextValidation};
