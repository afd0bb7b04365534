//! Voice token handler.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use serde::Serialize;
use tracing::info;
use voxgate_core::domain::voice::{ProxyOrigin, signal_proxy_url};
use voxgate_core::utils::mask_url;
use voxgate_core::{IceServer, TokenSignal, VoiceTokenGrant, VoiceTokenParams};

use crate::error::HttpError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct VoiceTokenResponse {
    pub token: String,
    pub url: String,
    pub urls: Vec<String>,
    pub participant_name: String,
    pub room_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ice_servers: Option<Vec<IceServer>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal_proxy_url: Option<String>,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Issue a voice session token and describe where to connect.
pub async fn token(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<VoiceTokenParams>,
) -> Result<Json<VoiceTokenResponse>, HttpError> {
    let lease = state.lease_token()?;
    let result = state
        .upstream
        .voice_tokens
        .issue_voice_token(&lease.secret, params)
        .await;
    state.tokens.report(
        &lease,
        result
            .as_ref()
            .map_or_else(|e| e.token_signal(), |_| TokenSignal::Success),
    );
    let data = result?;

    let grant = VoiceTokenGrant::from_upstream(&data, &state.settings.voice)?;
    let proxy_url = signal_proxy_url(
        &state.settings.voice,
        ProxyOrigin {
            forwarded_host: header_str(&headers, "x-forwarded-host"),
            forwarded_proto: header_str(&headers, "x-forwarded-proto"),
            host: header_str(&headers, "host"),
            scheme: "http",
        },
    );

    let VoiceTokenGrant {
        token,
        connection,
        participant_name,
        room_name,
    } = grant;

    info!(
        url = %mask_url(&connection.url),
        urls = connection.urls.len(),
        ice_servers = connection.ice_servers.len(),
        signal_proxy = proxy_url.is_some(),
        token_len = token.len(),
        "Voice token prepared"
    );

    Ok(Json(VoiceTokenResponse {
        token,
        url: connection.url,
        urls: connection.urls,
        participant_name,
        room_name,
        ice_servers: Some(connection.ice_servers).filter(|servers| !servers.is_empty()),
        signal_proxy_url: proxy_url,
    }))
}
