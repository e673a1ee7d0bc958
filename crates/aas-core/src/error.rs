//! Error types for aas-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid laser text: {0}")]
    InvalidLaserText(String),

    #[error("Invalid site '{0}'")]
    InvalidSite(String),

    #[error("Invalid batch: {0}")]
    InvalidBatch(String),

    #[error("Device '{0}' not found")]
    UnknownDevice(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
