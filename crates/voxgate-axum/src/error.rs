//! Axum-specific error types and mappings.
//!
//! Maps the service taxonomy ([`CoreError`]) and the runtime crate errors to
//! HTTP status codes and JSON bodies of the form `{error, status, type?}`.

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use voxgate_core::{CoreError, UpstreamCallError};
use voxgate_runtime::{TaskError, TokenPoolError};

/// Non-standard status for requests whose client went away.
pub const CLIENT_CLOSED_STATUS: u16 = 499;

/// Seconds a client should wait before retrying after a lock timeout.
const LOCK_RETRY_AFTER_SECS: u64 = 1;

/// Axum-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request (invalid input).
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A document lock was busy for the whole timeout.
    #[error("Resource busy: {0}")]
    LockTimeout(String),

    /// No credential is available in any configured pool.
    #[error("No token available: {0}")]
    NoToken(String),

    /// The client disconnected or the request was stopped.
    #[error("Client closed request")]
    ClientClosed,

    /// Upstream failed or returned something unusable.
    #[error("Upstream error: {0}")]
    BadGateway(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status: u16,
    /// Stable error type discriminant for client-side handling
    #[serde(skip_serializing_if = "Option::is_none", rename = "type")]
    error_type: Option<&'static str>,
}

impl HttpError {
    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::LockTimeout(_) | Self::NoToken(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::ClientClosed => {
                StatusCode::from_u16(CLIENT_CLOSED_STATUS).unwrap_or(StatusCode::BAD_REQUEST)
            }
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    const fn error_type(&self) -> Option<&'static str> {
        match self {
            Self::LockTimeout(_) => Some("lock_timeout"),
            Self::NoToken(_) => Some("no_token"),
            Self::ClientClosed => Some("client_closed"),
            Self::BadGateway(_) => Some("upstream_error"),
            Self::NotFound(_) | Self::BadRequest(_) | Self::Internal(_) => None,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::NotFound(msg)
            | Self::BadRequest(msg)
            | Self::LockTimeout(msg)
            | Self::NoToken(msg)
            | Self::BadGateway(msg)
            | Self::Internal(msg) => msg.clone(),
            Self::ClientClosed => "client_closed".to_string(),
        };

        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %message, "Request failed");
        }

        let body = ErrorBody {
            error: message,
            status: status.as_u16(),
            error_type: self.error_type(),
        };

        let mut response = (status, axum::Json(body)).into_response();
        if matches!(self, Self::LockTimeout(_)) {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(LOCK_RETRY_AFTER_SECS),
            );
        }
        response
    }
}

impl From<CoreError> for HttpError {
    fn from(err: CoreError) -> Self {
        match err {
            e @ CoreError::LockTimeout { .. } => Self::LockTimeout(e.to_string()),
            CoreError::NotFound(msg) => Self::NotFound(msg),
            e @ CoreError::NoTokenAvailable { .. } => Self::NoToken(e.to_string()),
            CoreError::ClientDisconnected => Self::ClientClosed,
            CoreError::Upstream(msg) => Self::BadGateway(msg),
            CoreError::Validation(msg) => Self::BadRequest(msg),
            CoreError::Storage(msg) => Self::Internal(format!("Storage: {msg}")),
            CoreError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl From<TaskError> for HttpError {
    fn from(err: TaskError) -> Self {
        CoreError::from(err).into()
    }
}

impl From<TokenPoolError> for HttpError {
    fn from(err: TokenPoolError) -> Self {
        CoreError::from(err).into()
    }
}

impl From<UpstreamCallError> for HttpError {
    fn from(err: UpstreamCallError) -> Self {
        Self::BadGateway(err.to_string())
    }
}
