//! Upstream service ports.
//!
//! Only the contract is modelled: a secret goes in, a loosely shaped JSON body
//! comes out, and failures are classified so the caller can report credential
//! health back to the pool.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::{ChatCompletionRequest, TokenSignal, VoiceTokenParams};

/// Classified failure of an authenticated upstream call.
#[derive(Debug, Error)]
pub enum UpstreamCallError {
    /// The credential hit a rate limit.
    #[error("Upstream rate limited the credential")]
    RateLimited,

    /// The credential was refused outright.
    #[error("Upstream rejected the credential (status {status})")]
    Rejected { status: u16 },

    /// Transport error or unexpected status.
    #[error("Upstream request failed: {0}")]
    Failed(String),

    /// The response body could not be decoded.
    #[error("Invalid upstream response: {0}")]
    InvalidResponse(String),
}

impl UpstreamCallError {
    /// Health signal to report for the credential that produced this error.
    ///
    /// Transport failures say nothing about the credential and count as success.
    #[must_use]
    pub const fn token_signal(&self) -> TokenSignal {
        match self {
            Self::RateLimited => TokenSignal::RateLimited,
            Self::Rejected { .. } => TokenSignal::Rejected,
            Self::Failed(_) | Self::InvalidResponse(_) => TokenSignal::Success,
        }
    }
}

/// Non-streaming chat completions.
#[async_trait]
pub trait ChatCompletionPort: Send + Sync {
    async fn complete(
        &self,
        secret: &str,
        request: ChatCompletionRequest,
    ) -> Result<Value, UpstreamCallError>;
}

/// Voice session token issuance.
#[async_trait]
pub trait VoiceTokenPort: Send + Sync {
    async fn issue_voice_token(
        &self,
        secret: &str,
        params: VoiceTokenParams,
    ) -> Result<Value, UpstreamCallError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_signal_mapping() {
        assert_eq!(
            UpstreamCallError::RateLimited.token_signal(),
            TokenSignal::RateLimited
        );
        assert_eq!(
            UpstreamCallError::Rejected { status: 401 }.token_signal(),
            TokenSignal::Rejected
        );
        assert_eq!(
            UpstreamCallError::Failed("boom".into()).token_signal(),
            TokenSignal::Success
        );
    }
}
