//! Document backends: one JSON file per key, or an in-memory map.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::warn;
use voxgate_core::{BackendError, DocumentBackend};

/// Stores each key as `<dir>/<key>.json`.
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// crash mid-write leaves either the old or the new document.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    dir: PathBuf,
}

impl JsonFileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

fn io_error(key: &str, err: &std::io::Error) -> BackendError {
    BackendError::Io {
        key: key.to_string(),
        message: err.to_string(),
    }
}

#[async_trait]
impl DocumentBackend for JsonFileBackend {
    async fn load(&self, key: &str) -> Result<Option<Value>, BackendError> {
        let path = self.path_for(key);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(key, &e)),
        };

        match serde_json::from_slice(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key, path = %path.display(), error = %e, "Stored document is not valid JSON, treating as empty");
                Ok(None)
            }
        }
    }

    async fn save(&self, key: &str, value: &Value) -> Result<(), BackendError> {
        let encoded = serde_json::to_vec_pretty(value).map_err(|e| BackendError::Encode {
            key: key.to_string(),
            message: e.to_string(),
        })?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error(key, &e))?;

        let path = self.path_for(key);
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        tokio::fs::write(&tmp, &encoded)
            .await
            .map_err(|e| io_error(key, &e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| io_error(key, &e))?;
        Ok(())
    }
}

/// Keeps documents in memory. Used by tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    values: RwLock<HashMap<String, Value>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raw value, bypassing the store. Handy for malformed-data tests.
    pub async fn insert_raw(&self, key: &str, value: Value) {
        self.values.write().await.insert(key.to_string(), value);
    }
}

#[async_trait]
impl DocumentBackend for MemoryBackend {
    async fn load(&self, key: &str) -> Result<Option<Value>, BackendError> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &Value) -> Result<(), BackendError> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_backend_missing_key_is_none() {
        let dir = TempDir::new().unwrap();
        let backend = JsonFileBackend::new(dir.path());
        assert!(backend.load("media_library").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_backend_save_and_load() {
        let dir = TempDir::new().unwrap();
        let backend = JsonFileBackend::new(dir.path().join("nested"));
        let value = json!({"version": 1, "items": [{"id": "a"}]});

        backend.save("media_library", &value).await.unwrap();
        assert_eq!(backend.load("media_library").await.unwrap(), Some(value));
        assert!(dir.path().join("nested/media_library.json").exists());
        assert!(!dir.path().join("nested/media_library.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_file_backend_garbage_is_none() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("media_library.json"), b"{\"version\": 1, \"ite").unwrap();
        let backend = JsonFileBackend::new(dir.path());
        assert!(backend.load("media_library").await.unwrap().is_none());
    }
}
