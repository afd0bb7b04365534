//! Key-value persistence behind the locked document store.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Failure of the underlying storage medium.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("I/O error on '{key}': {message}")]
    Io { key: String, message: String },

    #[error("Failed to encode '{key}': {message}")]
    Encode { key: String, message: String },
}

/// Whole-value load/save per key.
///
/// Implementations need only be atomic per call. Mutual exclusion across a
/// load/save pair is provided by the store's lock registry, not the backend.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Stored value for `key`, `None` when missing or unreadable as JSON.
    async fn load(&self, key: &str) -> Result<Option<Value>, BackendError>;

    /// Replace the stored value for `key`.
    async fn save(&self, key: &str, value: &Value) -> Result<(), BackendError>;
}
