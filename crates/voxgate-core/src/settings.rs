//! Settings domain types and validation.
//!
//! Pure data: the binary fills these from flags, environment and `.env`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default HTTP port for the gateway.
pub const DEFAULT_PORT: u16 = 8000;

/// Default time a mutating request waits for a document lock.
pub const DEFAULT_LOCK_TIMEOUT_SECS: u64 = 10;

/// Default interval between client-disconnect polls.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 200;

/// Default cooldown applied to a rate-limited credential.
pub const DEFAULT_TOKEN_COOLDOWN_SECS: u64 = 300;

/// Voice / signaling settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct VoiceSettings {
    /// Preferred LiveKit URL, tried before anything the upstream returns.
    pub livekit_url: Option<String>,

    /// Additional LiveKit URLs, in preference order.
    pub livekit_urls: Vec<String>,

    /// Whether to advertise the same-origin signaling proxy to clients.
    pub signal_proxy_enabled: bool,

    /// Explicit signaling proxy URL; derived from request headers when unset.
    pub signal_proxy_url: Option<String>,

    /// Timeout for opening the upstream signaling socket.
    pub connect_timeout_secs: u64,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            livekit_url: None,
            livekit_urls: Vec::new(),
            signal_proxy_enabled: true,
            signal_proxy_url: None,
            connect_timeout_secs: 15,
        }
    }
}

/// Application settings structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Interface to bind.
    pub host: String,

    /// HTTP port.
    pub port: u16,

    /// Directory holding one JSON document per resource class.
    pub data_dir: PathBuf,

    /// Shared key for `/v1/public/*`; auth is disabled when unset.
    pub public_key: Option<String>,

    /// Seconds a mutating request may wait for a document lock.
    pub lock_timeout_secs: u64,

    /// Milliseconds between client-disconnect polls.
    pub disconnect_poll_ms: u64,

    /// Seconds a rate-limited credential stays out of rotation.
    pub token_cooldown_secs: u64,

    /// Pools tried in order when an upstream call needs a credential.
    pub token_pools: Vec<String>,

    /// Upstream service base URL.
    pub upstream_base_url: String,

    /// Per-request upstream timeout in seconds.
    pub upstream_timeout_secs: u64,

    /// Model used for prompt enhancement.
    pub enhance_model: String,

    /// Voice / signaling settings.
    pub voice: VoiceSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Settings {
    /// Create settings with sensible defaults.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            data_dir: PathBuf::from("data"),
            public_key: None,
            lock_timeout_secs: DEFAULT_LOCK_TIMEOUT_SECS,
            disconnect_poll_ms: DEFAULT_POLL_INTERVAL_MS,
            token_cooldown_secs: DEFAULT_TOKEN_COOLDOWN_SECS,
            token_pools: vec!["ssoBasic".to_string(), "ssoSuper".to_string()],
            upstream_base_url: "https://grok.com".to_string(),
            upstream_timeout_secs: 120,
            enhance_model: "grok-4.1-fast".to_string(),
            voice: VoiceSettings::default(),
        }
    }

    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    #[must_use]
    pub const fn disconnect_poll_interval(&self) -> Duration {
        Duration::from_millis(self.disconnect_poll_ms)
    }

    #[must_use]
    pub const fn token_cooldown(&self) -> Duration {
        Duration::from_secs(self.token_cooldown_secs)
    }

    #[must_use]
    pub const fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    /// Public key with surrounding whitespace removed, `None` when blank.
    #[must_use]
    pub fn effective_public_key(&self) -> Option<&str> {
        self.public_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

/// Settings validation error.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Lock timeout must be between 1 and 300 seconds, got {0}")]
    InvalidLockTimeout(u64),

    #[error("Disconnect poll interval must be between 10 and 5000 ms, got {0}")]
    InvalidPollInterval(u64),

    #[error("At least one token pool must be configured")]
    NoTokenPools,

    #[error("Upstream base URL is invalid: {0}")]
    InvalidUpstreamUrl(String),

    #[error("Port must not be 0")]
    InvalidPort,
}

/// Validate settings values.
pub fn validate_settings(settings: &Settings) -> Result<(), SettingsError> {
    if settings.port == 0 {
        return Err(SettingsError::InvalidPort);
    }

    if !(1..=300).contains(&settings.lock_timeout_secs) {
        return Err(SettingsError::InvalidLockTimeout(settings.lock_timeout_secs));
    }

    if !(10..=5000).contains(&settings.disconnect_poll_ms) {
        return Err(SettingsError::InvalidPollInterval(
            settings.disconnect_poll_ms,
        ));
    }

    if settings
        .token_pools
        .iter()
        .all(|pool| pool.trim().is_empty())
    {
        return Err(SettingsError::NoTokenPools);
    }

    match url::Url::parse(&settings.upstream_base_url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
        _ => {
            return Err(SettingsError::InvalidUpstreamUrl(
                settings.upstream_base_url.clone(),
            ));
        }
    }

    Ok(())
}
