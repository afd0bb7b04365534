//! Store error type and its mapping into the service taxonomy.

use std::time::Duration;

use thiserror::Error;
use voxgate_core::{BackendError, CoreError};

#[derive(Debug, Error)]
pub enum StoreError {
    /// The key's lock was not acquired within the caller's timeout.
    #[error("Timed out after {waited:?} waiting for lock on '{key}'")]
    LockTimeout { key: String, waited: Duration },

    /// Keys are restricted to `[A-Za-z0-9_-]+`.
    #[error("Invalid document key: '{0}'")]
    InvalidKey(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Failed to encode document '{key}': {message}")]
    Encode { key: String, message: String },
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::LockTimeout { key, waited } => Self::LockTimeout { key, waited },
            StoreError::InvalidKey(key) => Self::Internal(format!("invalid document key '{key}'")),
            other => Self::Storage(other.to_string()),
        }
    }
}
