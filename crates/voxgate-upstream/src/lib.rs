//! Upstream access for voxgate.
//!
//! [`UpstreamClient`] implements the chat-completion and voice-token ports
//! over reqwest. [`connect_signal`] opens the upstream signaling socket and
//! hands back relay-ready halves.

#![deny(unsafe_code)]

mod client;
mod config;
mod error;
mod signal;

pub use client::{CHAT_COMPLETIONS_PATH, UpstreamClient, VOICE_TOKEN_PATH};
pub use config::UpstreamConfig;
pub use error::{UpstreamError, UpstreamResult};
pub use signal::{SignalReader, SignalWriter, connect_signal};

// Integration tests only
#[cfg(test)]
use bytes as _;
#[cfg(test)]
use tokio_test as _;
#[cfg(test)]
use wiremock as _;
