//! Core domain types, port definitions and pure helpers for voxgate.
//!
//! This crate has no I/O of its own. Storage, upstream access and the HTTP
//! surface live in adapter crates that implement the ports defined here.

#![deny(unsafe_code)]

pub mod domain;
pub mod error;
pub mod ports;
pub mod settings;
pub mod utils;

// Re-export commonly used types for convenience
pub use domain::{
    ChatCompletionRequest, ChatMessage, Document, FavoriteRequest, Frame, IceServer, ListQuery,
    MediaItem, MediaPage, MediaType, StopStatus, TokenHealth, TokenSignal, VoiceConnectionInfo,
    VoiceTokenGrant, VoiceTokenParams,
};
pub use error::CoreError;
pub use ports::{
    BackendError, ChatCompletionPort, DocumentBackend, UpstreamCallError, VoiceTokenPort,
};
pub use settings::{
    DEFAULT_LOCK_TIMEOUT_SECS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_PORT, DEFAULT_TOKEN_COOLDOWN_SECS,
    Settings, SettingsError, VoiceSettings, validate_settings,
};
