//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] aas_telemetry::TelemetryError),

    #[error("Client error: {0}")]
    Client(#[from] aas_client::ClientError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
