//! Service-level error taxonomy.
//!
//! Adapter crates keep their own error enums and convert into [`CoreError`]
//! at service boundaries. The HTTP adapter maps each variant to one status.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by voxgate services.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A per-key document lock could not be acquired in time.
    ///
    /// Retryable: the caller should back off and try again.
    #[error("Timed out after {waited:?} waiting for lock on '{key}'")]
    LockTimeout { key: String, waited: Duration },

    /// The referenced item does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Every pool in the priority list is out of usable credentials.
    #[error("No available tokens in pools [{}]", pools.join(", "))]
    NoTokenAvailable { pools: Vec<String> },

    /// The client went away while its request was in flight.
    #[error("Client disconnected")]
    ClientDisconnected,

    /// The upstream service failed or returned something unusable.
    #[error("Upstream failure: {0}")]
    Upstream(String),

    /// The request was malformed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Storage backend failure (filesystem, serialization).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Anything else.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether retrying the same request later can succeed without operator action.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout { .. } | Self::Upstream(_))
    }

    /// Shorthand for a validation failure.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_timeout_is_retryable() {
        let err = CoreError::LockTimeout {
            key: "media_library".to_string(),
            waited: Duration::from_secs(10),
        };
        assert!(err.is_retryable());
        assert!(err.to_string().contains("media_library"));
    }

    #[test]
    fn test_no_token_lists_pools() {
        let err = CoreError::NoTokenAvailable {
            pools: vec!["ssoBasic".to_string(), "ssoSuper".to_string()],
        };
        assert!(!err.is_retryable());
        assert_eq!(
            err.to_string(),
            "No available tokens in pools [ssoBasic, ssoSuper]"
        );
    }

    #[test]
    fn test_not_found_not_retryable() {
        assert!(!CoreError::NotFound("x".into()).is_retryable());
        assert!(!CoreError::ClientDisconnected.is_retryable());
    }
}
