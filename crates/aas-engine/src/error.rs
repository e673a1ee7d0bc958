//! Engine error types.

use aas_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid site '{site}'. Available: {available:?}")]
    InvalidSite { site: String, available: Vec<String> },

    #[error("No jobs in queue for site {0}")]
    NoQueuedJobs(String),

    /// A cycle started but found nothing to process for `site`.
    #[error("No jobs found for site")]
    NoJobsFound { site: String },

    #[error("Run '{0}' not found")]
    RunNotFound(String),

    #[error("Job '{0}' not found in queue")]
    JobNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type EngineResult<T> = Result<T, EngineError>;
