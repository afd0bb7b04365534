//! Small status endpoints.

use axum::Json;
use serde_json::{Value, json};

/// Confirms the caller's public key. Auth itself happens in middleware.
pub async fn verify() -> Json<Value> {
    Json(json!({"status": "success"}))
}
