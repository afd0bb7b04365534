//! Per-key lock registry.
//!
//! One async mutex per key, created on first use and kept for the life of the
//! registry. The registry map itself sits behind a plain mutex that is only
//! held long enough to clone an `Arc` out.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use crate::error::StoreError;

#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(key.to_string()).or_default())
    }

    /// Wait up to `timeout` for exclusive access to `key`.
    pub async fn acquire(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<OwnedMutexGuard<()>, StoreError> {
        let slot = self.slot(key);
        match tokio::time::timeout(timeout, slot.lock_owned()).await {
            Ok(guard) => {
                debug!(key, "Document lock acquired");
                Ok(guard)
            }
            Err(_) => Err(StoreError::LockTimeout {
                key: key.to_string(),
                waited: timeout,
            }),
        }
    }

    /// Number of keys that have ever been locked.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
