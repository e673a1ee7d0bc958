//! Client side of the AAS simulation API.
//!
//! - `client`: Typed HTTP calls for every `/api/v1` endpoint
//! - `poller`: Fixed-interval pollers feeding the dashboard views
//! - `events`: Server-sent event consumer with reconnect
//! - `composer`: Job submission with notification and delayed redirect
//! - `billing`: Confirmed billing reset

pub mod billing;
pub mod client;
pub mod composer;
pub mod error;
pub mod events;
pub mod poller;

pub use billing::{reset_billing, AlwaysConfirm, Confirm, ResetOutcome};
pub use client::{ApiClient, ExportFormat, DEFAULT_BASE_URL};
pub use composer::{Composer, Navigator, Notification, NotificationKind, Page, Redirect, SubmitOutcome};
pub use error::{ClientError, ClientResult};
pub use events::{EventStream, EventStreamState, SseParser};
pub use poller::{PollState, Poller};
