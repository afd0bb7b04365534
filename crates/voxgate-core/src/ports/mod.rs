//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces the core expects from infrastructure. They use
//! only domain types and `serde_json::Value`.
//!
//! # Design Rules
//!
//! - No `reqwest`, filesystem or socket types in any signature
//! - Backends persist whole values per key; merge logic stays with the caller
//! - Upstream ports take the credential secret explicitly so the token pool
//!   stays in charge of selection and health

pub mod document_backend;
pub mod upstream;

pub use document_backend::{BackendError, DocumentBackend};
pub use upstream::{ChatCompletionPort, UpstreamCallError, VoiceTokenPort};
