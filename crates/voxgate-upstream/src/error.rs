//! Internal error types for upstream access.
//!
//! These errors stay inside `voxgate-upstream` and are mapped to
//! [`UpstreamCallError`] at the port boundary.

use thiserror::Error;
use voxgate_core::UpstreamCallError;
use voxgate_runtime::RelayError;

/// Result type alias for upstream operations.
pub type UpstreamResult<T> = Result<T, UpstreamError>;

#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Upstream answered with a non-success status.
    #[error("Upstream request failed with status {status}: {url}")]
    Status {
        status: u16,
        /// Masked request URL
        url: String,
    },

    /// Upstream returned a body that is not the expected JSON.
    #[error("Invalid upstream response: {message}")]
    InvalidResponse { message: String },

    /// Network or HTTP client error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The signaling socket could not be opened.
    #[error("Signaling connect failed: {0}")]
    SignalConnect(String),

    #[error("Signaling connect timed out after {0:?}")]
    SignalTimeout(std::time::Duration),
}

impl From<UpstreamError> for UpstreamCallError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Status { status: 429, .. } => Self::RateLimited,
            UpstreamError::Status {
                status: status @ (401 | 403),
                ..
            } => Self::Rejected { status },
            UpstreamError::InvalidResponse { message } => Self::InvalidResponse(message),
            other => Self::Failed(other.to_string()),
        }
    }
}

impl From<UpstreamError> for RelayError {
    fn from(err: UpstreamError) -> Self {
        Self::transport(err)
    }
}
