//! Settings assembly from flags, environment and the tokens file.
//!
//! Every flag is optional and falls back to its `VOXGATE_*` variable; values
//! left unset keep the [`Settings`] defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::Args;
use voxgate_core::Settings;

use crate::error::CliError;

#[derive(Debug, Clone, Default, Args)]
pub struct SettingsArgs {
    /// Interface to bind
    #[arg(long, env = "VOXGATE_HOST", global = true)]
    pub host: Option<String>,

    /// HTTP port
    #[arg(short, long, env = "VOXGATE_PORT", global = true)]
    pub port: Option<u16>,

    /// Directory holding the JSON documents
    #[arg(long, env = "VOXGATE_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Shared key required on /v1/public/* (disabled when unset)
    #[arg(long, env = "VOXGATE_PUBLIC_KEY", global = true, hide_env_values = true)]
    pub public_key: Option<String>,

    /// Seconds a write may wait for a document lock
    #[arg(long, env = "VOXGATE_LOCK_TIMEOUT_SECS", global = true)]
    pub lock_timeout_secs: Option<u64>,

    /// Milliseconds between client-disconnect checks
    #[arg(long, env = "VOXGATE_DISCONNECT_POLL_MS", global = true)]
    pub disconnect_poll_ms: Option<u64>,

    /// Seconds a rate-limited credential stays out of rotation
    #[arg(long, env = "VOXGATE_TOKEN_COOLDOWN_SECS", global = true)]
    pub token_cooldown_secs: Option<u64>,

    /// Token pools in priority order
    #[arg(long, env = "VOXGATE_TOKEN_POOLS", global = true, value_delimiter = ',')]
    pub token_pools: Option<Vec<String>>,

    /// JSON file mapping pool names to credential lists
    #[arg(long, env = "VOXGATE_TOKENS_FILE", global = true)]
    pub tokens_file: Option<PathBuf>,

    /// Upstream service base URL
    #[arg(long, env = "VOXGATE_UPSTREAM_URL", global = true)]
    pub upstream_url: Option<String>,

    /// Per-request upstream timeout in seconds
    #[arg(long, env = "VOXGATE_UPSTREAM_TIMEOUT_SECS", global = true)]
    pub upstream_timeout_secs: Option<u64>,

    /// Model used for prompt enhancement
    #[arg(long, env = "VOXGATE_ENHANCE_MODEL", global = true)]
    pub enhance_model: Option<String>,

    /// Preferred LiveKit signaling URL
    #[arg(long, env = "VOXGATE_LIVEKIT_URL", global = true)]
    pub livekit_url: Option<String>,

    /// Additional LiveKit URLs, in preference order
    #[arg(long, env = "VOXGATE_LIVEKIT_URLS", global = true, value_delimiter = ',')]
    pub livekit_urls: Option<Vec<String>>,

    /// Advertise the same-origin signaling proxy
    #[arg(long, env = "VOXGATE_SIGNAL_PROXY", global = true, value_name = "BOOL")]
    pub signal_proxy: Option<bool>,

    /// Fixed signaling proxy URL instead of one derived from request headers
    #[arg(long, env = "VOXGATE_SIGNAL_PROXY_URL", global = true)]
    pub signal_proxy_url: Option<String>,

    /// Seconds allowed for opening the upstream signaling socket
    #[arg(long, env = "VOXGATE_VOICE_CONNECT_TIMEOUT_SECS", global = true)]
    pub voice_connect_timeout_secs: Option<u64>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn non_blank_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .filter_map(|v| non_blank(Some(v)))
        .collect()
}

impl SettingsArgs {
    /// Apply the given flags on top of [`Settings::with_defaults`].
    pub fn into_settings(self) -> Settings {
        let mut settings = Settings::with_defaults();
        if let Some(host) = non_blank(self.host) {
            settings.host = host;
        }
        if let Some(port) = self.port {
            settings.port = port;
        }
        if let Some(dir) = self.data_dir {
            settings.data_dir = dir;
        }
        settings.public_key = non_blank(self.public_key);
        if let Some(secs) = self.lock_timeout_secs {
            settings.lock_timeout_secs = secs;
        }
        if let Some(ms) = self.disconnect_poll_ms {
            settings.disconnect_poll_ms = ms;
        }
        if let Some(secs) = self.token_cooldown_secs {
            settings.token_cooldown_secs = secs;
        }
        if let Some(pools) = self.token_pools {
            settings.token_pools = non_blank_list(pools);
        }
        if let Some(url) = non_blank(self.upstream_url) {
            settings.upstream_base_url = url;
        }
        if let Some(secs) = self.upstream_timeout_secs {
            settings.upstream_timeout_secs = secs;
        }
        if let Some(model) = non_blank(self.enhance_model) {
            settings.enhance_model = model;
        }

        let voice = &mut settings.voice;
        voice.livekit_url = non_blank(self.livekit_url);
        if let Some(urls) = self.livekit_urls {
            voice.livekit_urls = non_blank_list(urls);
        }
        if let Some(enabled) = self.signal_proxy {
            voice.signal_proxy_enabled = enabled;
        }
        voice.signal_proxy_url = non_blank(self.signal_proxy_url);
        if let Some(secs) = self.voice_connect_timeout_secs {
            voice.connect_timeout_secs = secs;
        }

        settings
    }
}

/// Read a `{"<pool>": ["<secret>", ...]}` credentials file.
///
/// Blank secrets and pools left empty after trimming are dropped.
pub async fn load_tokens_file(path: &Path) -> Result<BTreeMap<String, Vec<String>>, CliError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CliError::Io(format!("reading {}: {e}", path.display())))?;
    let parsed: BTreeMap<String, Vec<String>> = serde_json::from_str(&raw).map_err(|e| {
        CliError::Config(format!(
            "{} must be a JSON object of pool name to secret list: {e}",
            path.display()
        ))
    })?;

    Ok(parsed
        .into_iter()
        .filter_map(|(pool, secrets)| {
            let pool = pool.trim().to_string();
            let secrets = non_blank_list(secrets);
            (!pool.is_empty() && !secrets.is_empty()).then_some((pool, secrets))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_unset_flags_keep_defaults() {
        let settings = SettingsArgs::default().into_settings();
        assert_eq!(settings, Settings::with_defaults());
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = SettingsArgs {
            port: Some(9100),
            public_key: Some("  ".into()),
            token_pools: Some(vec!["ssoSuper".into(), " ".into()]),
            livekit_url: Some("wss://lk.example.com".into()),
            signal_proxy: Some(false),
            ..SettingsArgs::default()
        };
        let settings = args.into_settings();
        assert_eq!(settings.port, 9100);
        assert_eq!(settings.public_key, None);
        assert_eq!(settings.token_pools, vec!["ssoSuper"]);
        assert_eq!(
            settings.voice.livekit_url.as_deref(),
            Some("wss://lk.example.com")
        );
        assert!(!settings.voice.signal_proxy_enabled);
    }

    #[tokio::test]
    async fn test_tokens_file_is_trimmed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"ssoBasic": [" a ", ""], "ssoSuper": ["b"], "empty": ["  "]}}"#
        )
        .unwrap();

        let tokens = load_tokens_file(file.path()).await.unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens["ssoBasic"], vec!["a"]);
        assert_eq!(tokens["ssoSuper"], vec!["b"]);
    }

    #[tokio::test]
    async fn test_tokens_file_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"["not", "a", "map"]"#).unwrap();
        let err = load_tokens_file(file.path()).await.unwrap_err();
        assert!(matches!(err, CliError::Config(_)));

        let err = load_tokens_file(Path::new("/nonexistent/voxgate/tokens.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Io(_)));
    }
}
