//! Reqwest-backed implementation of the upstream ports.
//!
//! Every call is authenticated with a single borrowed credential secret. The
//! client never picks credentials itself; the caller leases one from the
//! token pool and reports the classified outcome back.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, COOKIE, ORIGIN, REFERER};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, warn};
use url::Url;
use voxgate_core::utils::{mask_secret, mask_url};
use voxgate_core::{
    ChatCompletionPort, ChatCompletionRequest, UpstreamCallError, VoiceTokenParams, VoiceTokenPort,
};

use crate::config::UpstreamConfig;
use crate::error::{UpstreamError, UpstreamResult};

/// Path of the non-streaming chat completion endpoint.
pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Path of the voice session token endpoint.
pub const VOICE_TOKEN_PATH: &str = "/rest/livekit/tokens";

/// HTTP client for the upstream service.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    config: UpstreamConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceTokenBody {
    session_payload: String,
    request_agent_details: bool,
}

impl VoiceTokenBody {
    fn new(params: &VoiceTokenParams) -> Self {
        let payload = json!({
            "voice": params.voice,
            "personality": params.personality,
            "playback_speed": params.speed,
            "enable_vision": false,
        });
        Self {
            session_payload: payload.to_string(),
            request_agent_details: false,
        }
    }
}

fn session_cookie(secret: &str) -> String {
    format!("sso={secret}; sso-rw={secret}")
}

impl UpstreamClient {
    /// Build a client with its own connection pool.
    pub fn new(config: UpstreamConfig) -> UpstreamResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { http, config })
    }

    /// Wrap an existing reqwest client. The configured timeout is not applied.
    pub const fn from_reqwest(config: UpstreamConfig, http: reqwest::Client) -> Self {
        Self { http, config }
    }

    pub const fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> UpstreamResult<Url> {
        Ok(Url::parse(&format!("{}{path}", self.config.base_url))?)
    }

    /// POST `body` as JSON and decode the JSON reply.
    async fn post_json<B>(&self, secret: &str, path: &str, body: &B) -> UpstreamResult<Value>
    where
        B: Serialize + Sync + ?Sized,
    {
        let url = self.endpoint(path)?;
        let masked = mask_url(url.as_str());
        debug!(upstream = %masked, token = %mask_secret(secret), "Upstream request");

        let response = self
            .http
            .post(url)
            .header(COOKIE, session_cookie(secret))
            .header(ORIGIN, &self.config.origin)
            .header(REFERER, format!("{}/", self.config.origin))
            .header(CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                upstream = %masked,
                status = status.as_u16(),
                token = %mask_secret(secret),
                "Upstream returned error status"
            );
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                url: masked,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| UpstreamError::InvalidResponse {
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl ChatCompletionPort for UpstreamClient {
    async fn complete(
        &self,
        secret: &str,
        request: ChatCompletionRequest,
    ) -> Result<Value, UpstreamCallError> {
        Ok(self
            .post_json(secret, CHAT_COMPLETIONS_PATH, &request)
            .await?)
    }
}

#[async_trait]
impl VoiceTokenPort for UpstreamClient {
    async fn issue_voice_token(
        &self,
        secret: &str,
        params: VoiceTokenParams,
    ) -> Result<Value, UpstreamCallError> {
        let body = VoiceTokenBody::new(&params);
        Ok(self.post_json(secret, VOICE_TOKEN_PATH, &body).await?)
    }
}
