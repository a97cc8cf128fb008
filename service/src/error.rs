//! Service error taxonomy and HTTP mapping.
//!
//! Four caller-visible categories: `NotFound` and `InvalidInput` surface as
//! client errors, `Unavailable` as a retryable condition, and everything
//! transient in the storage layer folds into `Store`. Notification and
//! analytics failures never appear here at all — they are logged where they
//! happen and swallowed, because the log append is the durable fact.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use frontdesk_core::log_store::LogStoreError;
use frontdesk_core::presence::PresenceError;
use frontdesk_core::record::RecordError;
use frontdesk_core::runtime_queue::RuntimeQueueError;
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by the queue-routing service.
#[derive(Error, Debug)]
pub enum Error {
    /// Unknown code, counter or queue item.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed request data (bad scanned code, missing identity).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No counter currently meets the capacity/online criteria. Retryable.
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Log store failure.
    #[error(transparent)]
    Store(#[from] LogStoreError),

    /// Runtime queue failure.
    #[error(transparent)]
    RuntimeQueue(#[from] RuntimeQueueError),

    /// Presence backend failure.
    #[error(transparent)]
    Presence(#[from] PresenceError),

    /// A log entry failed to decode.
    #[error("Corrupt log entry: {0}")]
    Corrupt(#[from] RecordError),
}

/// Result alias for service operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    /// Error code for client error handling.
    code: &'static str,
    /// Human-readable error message.
    message: String,
}

impl Error {
    const fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Unavailable(_) => "UNAVAILABLE",
            Self::Store(_) | Self::RuntimeQueue(_) | Self::Presence(_) | Self::Corrupt(_) => {
                "INTERNAL"
            }
        }
    }

    const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Store(_) | Self::RuntimeQueue(_) | Self::Presence(_) | Self::Corrupt(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "Request failed");
        }

        let body = ErrorResponse {
            code: self.code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_taxonomy() {
        assert_eq!(
            Error::NotFound("counter".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::InvalidInput("bad code".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::Unavailable("no counters".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            Error::Store(LogStoreError::Store("down".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn display_includes_category() {
        let err = Error::Unavailable("no counter available".into());
        assert_eq!(err.to_string(), "Unavailable: no counter available");
    }
}
