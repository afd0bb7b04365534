//! Chat completion request shape and response text extraction.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

/// Default sampling temperature for prompt enhancement.
pub const DEFAULT_ENHANCE_TEMPERATURE: f32 = 0.7;

/// Highest sampling temperature accepted from callers.
pub const MAX_TEMPERATURE: f32 = 2.0;

const ENHANCE_SYSTEM_PROMPT: &str = "You are a visual prompt enhancer for an image \
generation model. Rewrite the user's prompt into one cinematic, detailed English prompt \
of 80 to 200 words focusing on composition, lighting, atmosphere and style. Then give a \
matching Chinese version and two or three lines of tunable parameters in the form \
`keyword -> option A / option B`. Output only those parts, with no commentary.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Non-streaming chat completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

impl ChatCompletionRequest {
    /// Request asking `model` to enhance an image prompt.
    #[must_use]
    pub fn prompt_enhancement(model: &str, raw_prompt: &str, temperature: f32) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![
                ChatMessage::system(ENHANCE_SYSTEM_PROMPT),
                ChatMessage::user(format!(
                    "Enhance the original prompt below, following your workflow and output \
                     format strictly.\n\nOriginal prompt:\n{raw_prompt}"
                )),
            ],
            stream: false,
            temperature: Some(temperature),
            top_p: Some(0.95),
        }
    }
}

/// Caller-supplied temperature, defaulted when absent.
///
/// Values outside `0..=MAX_TEMPERATURE` (and NaN) are rejected, not clamped.
pub fn enhance_temperature(requested: Option<f32>) -> Result<f32, CoreError> {
    match requested {
        None => Ok(DEFAULT_ENHANCE_TEMPERATURE),
        Some(t) if (0.0..=MAX_TEMPERATURE).contains(&t) => Ok(t),
        Some(_) => Err(CoreError::validation(format!(
            "temperature must be between 0 and {MAX_TEMPERATURE}"
        ))),
    }
}

/// Text of `choices[0].message.content`, trimmed.
///
/// Content may be a plain string or a list of strings / `{text}` parts, which
/// are joined with newlines. Anything else yields an empty string.
#[must_use]
pub fn extract_text(response: &Value) -> String {
    let content = response
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"));

    match content {
        Some(Value::String(text)) => text.trim().to_string(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|part| match part {
                Value::String(text) => Some(text.as_str()),
                Value::Object(obj) => obj.get("text").and_then(Value::as_str),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string(),
        _ => String::new(),
    }
}
