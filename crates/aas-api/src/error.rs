//! API error type and its HTTP rendering.

use aas_core::api::ErrorBody;
use aas_core::CoreError;
use aas_engine::EngineError;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

/// Errors returned by route handlers. Rendered as `{"detail": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// Request body or query failed validation.
    #[error("{0}")]
    Unprocessable(String),

    #[error("{0}")]
    Unavailable(String),

    /// An operation failed; the message is shown to the caller as is.
    #[error("{0}")]
    Failed(String),

    /// Unexpected failure. The caller sees a generic detail plus the cause.
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Failed(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            Self::Internal(message) => ErrorBody {
                detail: Some("Internal Server Error".to_string()),
                message: Some(message.clone()),
            },
            Self::BadRequest(detail)
            | Self::NotFound(detail)
            | Self::Unprocessable(detail)
            | Self::Unavailable(detail)
            | Self::Failed(detail) => ErrorBody {
                detail: Some(detail.clone()),
                message: None,
            },
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::UnknownDevice(_) => Self::NotFound(e.to_string()),
            CoreError::InvalidSite(_) => Self::BadRequest(e.to_string()),
            CoreError::InvalidLaserText(_) | CoreError::InvalidBatch(_) => {
                Self::Unprocessable(e.to_string())
            }
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::InvalidSite { .. }
            | EngineError::NoQueuedJobs(_)
            | EngineError::NoJobsFound { .. }
            | EngineError::InvalidConfig(_) => Self::BadRequest(e.to_string()),
            EngineError::RunNotFound(_) | EngineError::JobNotFound(_) => {
                Self::NotFound(e.to_string())
            }
            EngineError::Core(core) => core.into(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Unprocessable(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Unprocessable(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        }
        (status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_status_mapping() {
        let cases: Vec<(EngineError, StatusCode)> = vec![
            (
                EngineError::InvalidSite {
                    site: "X".into(),
                    available: vec!["HOME".into()],
                },
                StatusCode::BAD_REQUEST,
            ),
            (EngineError::NoQueuedJobs("JOB_POS1".into()), StatusCode::BAD_REQUEST),
            (EngineError::RunNotFound("r".into()), StatusCode::NOT_FOUND),
            (EngineError::JobNotFound("E-1".into()), StatusCode::NOT_FOUND),
            (
                EngineError::Core(CoreError::UnknownDevice("robot".into())),
                StatusCode::NOT_FOUND,
            ),
            (
                EngineError::Core(CoreError::InvalidLaserText("empty".into())),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_internal_error_body() {
        let body = ApiError::Internal("disk full".into()).body();
        assert_eq!(body.detail.as_deref(), Some("Internal Server Error"));
        assert_eq!(body.message.as_deref(), Some("disk full"));

        let body = ApiError::NotFound("Device 'robot' not found".into()).body();
        assert_eq!(body.detail.as_deref(), Some("Device 'robot' not found"));
        assert!(body.message.is_none());
    }
}
