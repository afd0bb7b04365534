//! The locked document store.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use voxgate_core::{Document, DocumentBackend};

use crate::error::StoreError;
use crate::lock::KeyedLocks;

/// Documents keyed by resource class, guarded by per-key locks.
pub struct DocumentStore {
    backend: Arc<dyn DocumentBackend>,
    locks: KeyedLocks,
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}

fn validate_key(key: &str) -> Result<(), StoreError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

async fn load_from<T: DeserializeOwned>(
    backend: &dyn DocumentBackend,
    key: &str,
) -> Result<Document<T>, StoreError> {
    Ok(backend
        .load(key)
        .await?
        .map_or_else(Document::empty, Document::from_value_lenient))
}

impl DocumentStore {
    pub fn new(backend: Arc<dyn DocumentBackend>) -> Self {
        Self {
            backend,
            locks: KeyedLocks::new(),
        }
    }

    /// Take the lock for `key`, waiting at most `timeout`.
    pub async fn acquire_lock(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<DocumentLock, StoreError> {
        validate_key(key)?;
        let guard = self.locks.acquire(key, timeout).await?;
        Ok(DocumentLock {
            key: key.to_string(),
            backend: Arc::clone(&self.backend),
            _guard: guard,
        })
    }

    /// Unlocked read. A missing or malformed document reads as empty.
    pub async fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Document<T>, StoreError> {
        validate_key(key)?;
        load_from(self.backend.as_ref(), key).await
    }

    /// Run one read-modify-write cycle on `key`.
    ///
    /// `mutate` sees the freshly loaded document while the lock is held. The
    /// document is saved only when `mutate` returns `Ok`.
    pub async fn update<T, R, E, F>(&self, key: &str, timeout: Duration, mutate: F) -> Result<R, E>
    where
        T: DeserializeOwned + Serialize,
        F: FnOnce(&mut Document<T>) -> Result<R, E>,
        E: From<StoreError>,
    {
        let lock = self.acquire_lock(key, timeout).await?;
        let mut doc = lock.load::<T>().await?;
        let output = mutate(&mut doc)?;
        lock.save(&doc).await?;
        Ok(output)
    }
}

/// Exclusive access to one document key. Released on drop.
///
/// Saving is only possible through a held lock.
pub struct DocumentLock {
    key: String,
    backend: Arc<dyn DocumentBackend>,
    _guard: tokio::sync::OwnedMutexGuard<()>,
}

impl std::fmt::Debug for DocumentLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentLock")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl DocumentLock {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn load<T: DeserializeOwned>(&self) -> Result<Document<T>, StoreError> {
        load_from(self.backend.as_ref(), &self.key).await
    }

    /// Replace the stored document for the locked key.
    pub async fn save<T: Serialize>(&self, doc: &Document<T>) -> Result<(), StoreError> {
        let value = doc.to_value().map_err(|e| StoreError::Encode {
            key: self.key.clone(),
            message: e.to_string(),
        })?;
        self.backend.save(&self.key, &value).await?;
        debug!(key = %self.key, items = doc.items.len(), "Document saved");
        Ok(())
    }
}
