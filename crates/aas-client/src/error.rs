//! Client error types.

use aas_core::api::ErrorBody;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced a response (connection refused, reset, ...).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response. `message` is the backend `detail`/`message`, or
    /// `HTTP {status}` when the body carried neither.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Invalid base URL: {0}")]
    InvalidUrl(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    /// Build the error for a non-2xx response. The body is parsed
    /// defensively: anything unreadable counts as an empty object.
    pub fn from_response(status: StatusCode, body: &[u8]) -> Self {
        let parsed: ErrorBody = serde_json::from_slice(body).unwrap_or_default();
        let message = parsed
            .best_message()
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
        Self::Api {
            status: status.as_u16(),
            message,
        }
    }

    /// Message the backend supplied, if any.
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            Self::Api { message, .. } => Some(message),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_then_message_then_status() {
        let err = ClientError::from_response(
            StatusCode::BAD_REQUEST,
            br#"{"detail": "No jobs in queue for site JOB_POS1", "message": "ignored"}"#,
        );
        assert_eq!(err.backend_message(), Some("No jobs in queue for site JOB_POS1"));

        let err = ClientError::from_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            br#"{"message": "disk full"}"#,
        );
        assert_eq!(err.backend_message(), Some("disk full"));

        let err = ClientError::from_response(StatusCode::BAD_GATEWAY, b"<html>bad gateway</html>");
        assert_eq!(err.backend_message(), Some("HTTP 502"));
        assert_eq!(err.to_string(), "HTTP 502");
    }

    #[test]
    fn test_non_string_detail_falls_back() {
        let err = ClientError::from_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            br#"{"detail": [{"loc": ["body"], "msg": "field required"}]}"#,
        );
        assert_eq!(err.backend_message(), Some("HTTP 422"));
    }
}
