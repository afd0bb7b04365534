//! Locked document store for voxgate.
//!
//! Each logical resource class lives in one JSON document under a key such
//! as `media_library`. Every mutation runs the read-modify-write protocol
//! under a per-key lock:
//!
//! 1. acquire the key's lock (bounded by a timeout)
//! 2. load the document
//! 3. compute the new state
//! 4. save it
//! 5. release the lock
//!
//! Different keys never contend. The media library is the first resource
//! built on top of it.

#![deny(unsafe_code)]

pub mod backend;
pub mod error;
pub mod lock;
pub mod media_library;
pub mod store;

pub use backend::{JsonFileBackend, MemoryBackend};
pub use error::StoreError;
pub use lock::KeyedLocks;
pub use media_library::{FavoriteKind, FavoriteOutcome, MEDIA_LIBRARY_KEY, MediaLibrary};
pub use store::{DocumentLock, DocumentStore};
