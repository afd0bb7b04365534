//! Voice session connection details.
//!
//! The upstream voice-token response is loosely shaped, so everything here
//! probes ordered candidate paths and normalizes what it finds. Configured
//! URLs always win over upstream ones and the public default comes last.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::settings::VoiceSettings;
use crate::utils::json_path::{deep_get, first_string};

/// Used when neither settings nor the upstream name a signaling server.
pub const DEFAULT_LIVEKIT_URL: &str = "wss://livekit.grok.com";

/// Path of the same-origin signaling proxy.
pub const SIGNAL_PROXY_PATH: &str = "/v1/public/voice/signal";

const URL_PATHS: &[&[&str]] = &[
    &["url"],
    &["livekitUrl"],
    &["livekit_url"],
    &["livekitServerUrl"],
    &["ws_url"],
    &["serverUrl"],
    &["livekit", "url"],
    &["livekit", "ws_url"],
    &["connection", "url"],
    &["connectionDetails", "url"],
    &["connection_details", "url"],
];

const URL_LIST_PATHS: &[&[&str]] = &[
    &["urls"],
    &["livekitUrls"],
    &["livekit_urls"],
    &["connection", "urls"],
    &["connectionDetails", "urls"],
    &["connection_details", "urls"],
];

const ICE_PATHS: &[&[&str]] = &[
    &["iceServers"],
    &["ice_servers"],
    &["rtcConfig", "iceServers"],
    &["rtcConfig", "ice_servers"],
    &["rtc_config", "iceServers"],
    &["rtc_config", "ice_servers"],
    &["connectionDetails", "rtcConfig", "iceServers"],
    &["connectionDetails", "rtc_config", "ice_servers"],
    &["connection_details", "rtcConfig", "iceServers"],
];

const PARTICIPANT_PATHS: &[&[&str]] = &[&["participant_name"], &["participantName"], &["identity"]];

const ROOM_PATHS: &[&[&str]] = &[&["room_name"], &["roomName"], &["room"]];

/// Query parameters of a voice token request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceTokenParams {
    #[serde(default = "default_voice")]
    pub voice: String,
    #[serde(default = "default_personality")]
    pub personality: String,
    #[serde(default = "default_speed")]
    pub speed: f32,
}

fn default_voice() -> String {
    "ara".to_string()
}

fn default_personality() -> String {
    "assistant".to_string()
}

const fn default_speed() -> f32 {
    1.0
}

impl Default for VoiceTokenParams {
    fn default() -> Self {
        Self {
            voice: default_voice(),
            personality: default_personality(),
            speed: default_speed(),
        }
    }
}

/// One normalized ICE server entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<Value>,
}

/// Where a client should connect for a voice session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceConnectionInfo {
    /// Preferred URL, always `urls[0]`.
    pub url: String,
    /// Deduplicated candidates in preference order, never empty.
    pub urls: Vec<String>,
    pub ice_servers: Vec<IceServer>,
}

impl VoiceConnectionInfo {
    /// Merge configured and upstream-provided URLs and pick ICE servers.
    #[must_use]
    pub fn extract(data: &Value, settings: &VoiceSettings) -> Self {
        let upstream_primary = first_string(data, URL_PATHS);
        let upstream_urls = URL_LIST_PATHS
            .iter()
            .map(|path| deep_get(data, path).map(ws_url_list).unwrap_or_default())
            .find(|urls| !urls.is_empty())
            .unwrap_or_default();

        let mut urls: Vec<String> = Vec::new();
        let candidates = settings
            .livekit_url
            .iter()
            .chain(settings.livekit_urls.iter())
            .chain(upstream_primary.iter())
            .chain(upstream_urls.iter())
            .map(String::as_str)
            .chain(std::iter::once(DEFAULT_LIVEKIT_URL));
        for candidate in candidates {
            push_unique(&mut urls, candidate);
        }

        let ice_servers = ICE_PATHS
            .iter()
            .map(|path| deep_get(data, path).map(ice_servers).unwrap_or_default())
            .find(|servers| !servers.is_empty())
            .unwrap_or_default();

        let url = urls
            .first()
            .cloned()
            .unwrap_or_else(|| DEFAULT_LIVEKIT_URL.to_string());

        Self {
            url,
            urls,
            ice_servers,
        }
    }
}

/// A voice token plus everything a client needs to use it.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceTokenGrant {
    pub token: String,
    pub connection: VoiceConnectionInfo,
    pub participant_name: String,
    pub room_name: String,
}

impl VoiceTokenGrant {
    /// Interpret an upstream voice-token response.
    ///
    /// Fails with [`CoreError::Upstream`] when the response carries no token.
    pub fn from_upstream(data: &Value, settings: &VoiceSettings) -> Result<Self, CoreError> {
        let token = data
            .get("token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CoreError::Upstream("upstream returned no voice token".to_string()))?;

        Ok(Self {
            token: token.to_string(),
            connection: VoiceConnectionInfo::extract(data, settings),
            participant_name: first_string(data, PARTICIPANT_PATHS).unwrap_or_default(),
            room_name: first_string(data, ROOM_PATHS).unwrap_or_default(),
        })
    }
}

/// Normalize a signaling URL to `scheme://host[:port]/path` without a trailing slash.
///
/// A bare host gets `wss://`. Anything that is not ws/wss with a host is rejected.
#[must_use]
pub fn normalize_ws_url(raw: &str) -> Option<String> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    let candidate = if value.contains("://") {
        value.to_string()
    } else {
        format!("wss://{value}")
    };
    let parsed = url::Url::parse(&candidate).ok()?;
    if !matches!(parsed.scheme(), "ws" | "wss") {
        return None;
    }
    let host = parsed.host_str().filter(|h| !h.is_empty())?;
    let port = parsed.port().map(|p| format!(":{p}")).unwrap_or_default();
    let path = parsed.path().trim_end_matches('/');
    Some(format!("{}://{host}{port}{path}", parsed.scheme()))
}

/// Normalize a URL list given as an array or a comma/newline separated string.
#[must_use]
pub fn ws_url_list(raw: &Value) -> Vec<String> {
    let values: Vec<&str> = match raw {
        Value::String(text) => text.split([',', '\n']).collect(),
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => return Vec::new(),
    };
    let mut result = Vec::new();
    for value in values {
        push_unique(&mut result, value);
    }
    result
}

fn push_unique(urls: &mut Vec<String>, candidate: &str) {
    if let Some(normalized) = normalize_ws_url(candidate)
        && !urls.contains(&normalized)
    {
        urls.push(normalized);
    }
}

/// Normalize ICE servers, accepting `urls` or `url` as a string or list.
#[must_use]
pub fn ice_servers(raw: &Value) -> Vec<IceServer> {
    let Some(entries) = raw.as_array() else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|entry| {
            let urls_value = entry
                .get("urls")
                .filter(|v| !v.is_null())
                .or_else(|| entry.get("url"))?;
            let urls: Vec<String> = match urls_value {
                Value::String(url) => vec![url.trim().to_string()],
                Value::Array(list) => list
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|u| u.trim().to_string())
                    .collect(),
                _ => Vec::new(),
            };
            let urls: Vec<String> = urls.into_iter().filter(|u| !u.is_empty()).collect();
            if urls.is_empty() {
                return None;
            }
            let username = entry
                .get("username")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(str::to_string);
            let credential = entry.get("credential").filter(|c| !c.is_null()).cloned();
            Some(IceServer {
                urls,
                username,
                credential,
            })
        })
        .collect()
}

/// Request headers that decide the advertised signaling proxy URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProxyOrigin<'a> {
    pub forwarded_host: Option<&'a str>,
    pub forwarded_proto: Option<&'a str>,
    pub host: Option<&'a str>,
    /// Scheme the request arrived on when no proxy header says otherwise.
    pub scheme: &'a str,
}

/// Same-origin signaling proxy URL to hand to clients, if enabled.
#[must_use]
pub fn signal_proxy_url(settings: &VoiceSettings, origin: ProxyOrigin<'_>) -> Option<String> {
    if !settings.signal_proxy_enabled {
        return None;
    }
    if let Some(configured) = settings.signal_proxy_url.as_deref().and_then(normalize_ws_url) {
        return Some(configured);
    }

    let host = origin
        .forwarded_host
        .and_then(first_header_value)
        .or_else(|| origin.host.map(str::trim).filter(|h| !h.is_empty()))?;
    let proto = origin
        .forwarded_proto
        .and_then(first_header_value)
        .unwrap_or(origin.scheme)
        .to_ascii_lowercase();
    let ws_scheme = if proto == "https" { "wss" } else { "ws" };
    Some(format!("{ws_scheme}://{host}{SIGNAL_PROXY_PATH}"))
}

fn first_header_value(raw: &str) -> Option<&str> {
    raw.split(',').next().map(str::trim).filter(|v| !v.is_empty())
}

/// Map a proxied signaling request onto the upstream URL.
///
/// The base is the `upstream` override, then configured URLs, then the
/// default. `tail` is appended to the base path unless the base already ends
/// with it. Every query pair except `upstream` is forwarded.
pub fn upstream_signal_url(
    settings: &VoiceSettings,
    upstream_override: Option<&str>,
    tail: &str,
    query: &[(String, String)],
) -> Result<String, CoreError> {
    let base = upstream_override
        .and_then(normalize_ws_url)
        .or_else(|| settings.livekit_url.as_deref().and_then(normalize_ws_url))
        .or_else(|| settings.livekit_urls.iter().find_map(|u| normalize_ws_url(u)))
        .unwrap_or_else(|| DEFAULT_LIVEKIT_URL.to_string());

    let mut target = url::Url::parse(&base)
        .map_err(|e| CoreError::Internal(format!("invalid signaling base url: {e}")))?;

    let base_path = target.path().trim_end_matches('/').to_string();
    let tail_clean = tail.trim_matches('/');
    let path = if tail_clean.is_empty() {
        base_path
    } else {
        let tail_path = format!("/{tail_clean}");
        if base_path.ends_with(&tail_path) {
            base_path
        } else {
            format!("{base_path}{tail_path}")
        }
    };
    target.set_path(&path);

    let forwarded: Vec<&(String, String)> =
        query.iter().filter(|(key, _)| key != "upstream").collect();
    if forwarded.is_empty() {
        target.set_query(None);
    } else {
        target
            .query_pairs_mut()
            .clear()
            .extend_pairs(forwarded.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }

    Ok(target.to_string())
}
