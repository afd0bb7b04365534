//! Credential pool status.

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use voxgate_runtime::PoolSnapshot;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct TokenStatusResponse {
    pub status: &'static str,
    pub pools: Vec<PoolSnapshot>,
}

/// Masked per-pool health snapshot.
pub async fn status(State(state): State<AppState>) -> Json<TokenStatusResponse> {
    Json(TokenStatusResponse {
        status: "success",
        pools: state.tokens.snapshot(),
    })
}
