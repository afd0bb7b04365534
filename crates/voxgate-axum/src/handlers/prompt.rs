//! Prompt enhancement handlers.
//!
//! An enhancement is a long upstream chat call registered in the task
//! registry under a client-supplied request id, so it can be stopped
//! explicitly or abandoned when the client goes away.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;
use voxgate_core::domain::chat::{enhance_temperature, extract_text};
use voxgate_core::{ChatCompletionRequest, StopStatus, TokenSignal};

use crate::error::HttpError;
use crate::state::AppState;

/// Header carrying the request id when the body does not.
pub const REQUEST_ID_HEADER: &str = "x-enhance-request-id";

#[derive(Debug, Default, Deserialize)]
pub struct EnhanceRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub request_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EnhanceResponse {
    pub enhanced_prompt: String,
    pub model: String,
    pub request_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct StopRequest {
    #[serde(default)]
    pub request_id: String,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub status: StopStatus,
    pub request_id: String,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn resolve_request_id(body: Option<&str>, headers: &HeaderMap) -> String {
    non_blank(body)
        .or_else(|| non_blank(headers.get(REQUEST_ID_HEADER).and_then(|v| v.to_str().ok())))
        .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string())
}

/// Enhance an image prompt through the upstream chat model.
///
/// Responds 499 `client_closed` when the request is stopped or the client
/// disconnects before the upstream call finishes.
pub async fn enhance(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<EnhanceRequest>,
) -> Result<Json<EnhanceResponse>, HttpError> {
    let raw_prompt = body.prompt.trim().to_string();
    if raw_prompt.is_empty() {
        return Err(HttpError::BadRequest("prompt is required".to_string()));
    }
    let temperature = enhance_temperature(body.temperature)?;
    let request_id = resolve_request_id(body.request_id.as_deref(), &headers);
    let model = state.settings.enhance_model.clone();

    let lease = state.lease_token()?;
    let request = ChatCompletionRequest::prompt_enhancement(
        &model,
        &raw_prompt,
        temperature,
    );

    let chat = Arc::clone(&state.upstream.chat);
    let tokens = Arc::clone(&state.tokens);
    let handle = state.tasks.register(&request_id, async move {
        let result = chat.complete(&lease.secret, request).await;
        let signal = result
            .as_ref()
            .map_or_else(|e| e.token_signal(), |_| TokenSignal::Success);
        tokens.report(&lease, signal);
        result
    })?;

    info!(
        request_id = %request_id,
        prompt_len = raw_prompt.chars().count(),
        "Prompt enhance started"
    );

    // Cancelled when this handler future is dropped, i.e. the client left.
    let liveness = CancellationToken::new();
    let _client_gone_on_drop = liveness.clone().drop_guard();
    let tasks = state.tasks.clone();
    let waiter = tokio::spawn(async move {
        tasks
            .await_with_disconnect(handle, move || liveness.is_cancelled())
            .await
    });

    let response = waiter
        .await
        .map_err(|e| HttpError::Internal(e.to_string()))??
        .map_err(HttpError::from)?;

    let enhanced_prompt = extract_text(&response);
    if enhanced_prompt.is_empty() {
        return Err(HttpError::BadGateway(
            "upstream returned empty content".to_string(),
        ));
    }

    info!(
        request_id = %request_id,
        output_len = enhanced_prompt.chars().count(),
        "Prompt enhance finished"
    );
    Ok(Json(EnhanceResponse {
        enhanced_prompt,
        model,
        request_id,
    }))
}

/// Stop an in-flight enhancement. Never an error for unknown ids.
pub async fn stop(
    State(state): State<AppState>,
    Json(body): Json<StopRequest>,
) -> Result<Json<StopResponse>, HttpError> {
    let request_id = body.request_id.trim().to_string();
    if request_id.is_empty() {
        return Err(HttpError::BadRequest("request_id is required".to_string()));
    }
    let status = state.tasks.stop(&request_id);
    Ok(Json(StopResponse { status, request_id }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_request_id_prefers_body_then_header() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("from-header"));

        assert_eq!(resolve_request_id(Some(" from-body "), &headers), "from-body");
        assert_eq!(resolve_request_id(Some("  "), &headers), "from-header");

        let generated = resolve_request_id(None, &HeaderMap::new());
        assert_eq!(generated.len(), 32);
        assert!(generated.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
