//! Versioned document envelope shared by every document-backed resource.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Version written for new documents.
pub const DOCUMENT_VERSION: u32 = 1;

/// `{version, items}` envelope stored under one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document<T> {
    pub version: u32,
    pub items: Vec<T>,
}

impl<T> Default for Document<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> Document<T> {
    /// `{version: 1, items: []}`.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            version: DOCUMENT_VERSION,
            items: Vec::new(),
        }
    }

    #[must_use]
    pub const fn from_items(items: Vec<T>) -> Self {
        Self {
            version: DOCUMENT_VERSION,
            items,
        }
    }
}

impl<T: DeserializeOwned> Document<T> {
    /// Decode a stored value without ever failing.
    ///
    /// A non-object root or a non-array `items` yields an empty document, and
    /// items that do not decode as `T` are dropped. A process that crashed
    /// mid-write must not take the resource down with it.
    #[must_use]
    pub fn from_value_lenient(value: Value) -> Self {
        let Value::Object(mut root) = value else {
            return Self::empty();
        };

        let version = root
            .get("version")
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(DOCUMENT_VERSION);

        let items = match root.remove("items") {
            Some(Value::Array(raw)) => raw
                .into_iter()
                .filter(Value::is_object)
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
            _ => Vec::new(),
        };

        Self { version, items }
    }
}

impl<T: Serialize> Document<T> {
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
