//! Shared helpers for the router integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use mockall::mock;
use serde_json::{Value, json};
use tower::ServiceExt;
use voxgate_axum::{AppState, AxumContext, CorsConfig, UpstreamPorts, router_with_state};
use voxgate_core::{
    ChatCompletionPort, ChatCompletionRequest, Settings, UpstreamCallError, VoiceTokenParams,
    VoiceTokenPort,
};
use voxgate_store::MemoryBackend;

pub const SECRET: &str = "sso-test-secret-0123456789";

mock! {
    pub Chat {}

    #[async_trait]
    impl ChatCompletionPort for Chat {
        async fn complete(
            &self,
            secret: &str,
            request: ChatCompletionRequest,
        ) -> Result<Value, UpstreamCallError>;
    }
}

mock! {
    pub Voice {}

    #[async_trait]
    impl VoiceTokenPort for Voice {
        async fn issue_voice_token(
            &self,
            secret: &str,
            params: VoiceTokenParams,
        ) -> Result<Value, UpstreamCallError>;
    }
}

/// What happened to the calls made against a [`SlowChat`].
#[derive(Debug, Default)]
pub struct CallProbe {
    finished: AtomicBool,
    dropped: AtomicBool,
}

impl CallProbe {
    /// The call was dropped before it produced a result.
    pub fn cancelled(&self) -> bool {
        self.dropped.load(Ordering::SeqCst) && !self.finished.load(Ordering::SeqCst)
    }
}

struct DropFlag(Arc<CallProbe>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.dropped.store(true, Ordering::SeqCst);
    }
}

/// Chat port that takes `delay` to answer.
pub struct SlowChat {
    delay: Duration,
    probe: Arc<CallProbe>,
}

impl SlowChat {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            probe: Arc::new(CallProbe::default()),
        }
    }

    pub fn probe(&self) -> Arc<CallProbe> {
        Arc::clone(&self.probe)
    }
}

#[async_trait]
impl ChatCompletionPort for SlowChat {
    async fn complete(
        &self,
        _secret: &str,
        _request: ChatCompletionRequest,
    ) -> Result<Value, UpstreamCallError> {
        let _flag = DropFlag(Arc::clone(&self.probe));
        tokio::time::sleep(self.delay).await;
        self.probe.finished.store(true, Ordering::SeqCst);
        Ok(json!({"choices": [{"message": {"content": "too late"}}]}))
    }
}

pub fn test_settings() -> Settings {
    let mut settings = Settings::with_defaults();
    settings.disconnect_poll_ms = 20;
    settings.lock_timeout_secs = 1;
    settings
}

pub fn state_with(
    settings: Settings,
    chat: impl ChatCompletionPort + 'static,
    voice: impl VoiceTokenPort + 'static,
) -> AppState {
    Arc::new(AxumContext::new(
        settings,
        Arc::new(MemoryBackend::new()),
        UpstreamPorts {
            chat: Arc::new(chat),
            voice_tokens: Arc::new(voice),
            origin: "https://grok.com".to_string(),
        },
    ))
}

/// State with no upstream expectations and one credential in `ssoBasic`.
pub fn default_state() -> AppState {
    let state = state_with(test_settings(), MockChat::new(), MockVoice::new());
    state.tokens.add_token("ssoBasic", SECRET);
    state
}

pub fn app(state: &AppState) -> Router {
    router_with_state(Arc::clone(state), &CorsConfig::AllowAll)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn json_request(method: Method, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Run one request; an empty or non-JSON body comes back as `Value::Null`.
pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, body)
}

/// Poll `condition` every 10ms for up to two seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}
