//! Route definitions and router construction.
//!
//! Everything public lives under `/v1/public`. When a public key is
//! configured the HTTP routes there require `Authorization: Bearer <key>`.
//! The signaling WebSocket is exempt because browsers cannot attach headers
//! to an upgrade request.

use std::sync::Arc;

use axum::extract::Request;
use axum::http::{StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};

use crate::bootstrap::{AxumContext, CorsConfig};
use crate::handlers;
use crate::state::AppState;

/// Build CORS layer from configuration.
fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    match config {
        CorsConfig::AllowAll => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        CorsConfig::AllowOrigins(origins) => {
            use axum::http::HeaderValue;
            let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(allowed)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}

/// HTTP routes under `/v1/public` that sit behind the public key.
pub(crate) fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/verify", get(handlers::system::verify))
        // Media library
        .route(
            "/media_library/favorite",
            post(handlers::media_library::favorite),
        )
        .route(
            "/media_library/unfavorite",
            post(handlers::media_library::unfavorite),
        )
        .route("/media_library/get", get(handlers::media_library::get))
        .route(
            "/media_library/delete",
            delete(handlers::media_library::delete),
        )
        .route("/media_library/list", get(handlers::media_library::list))
        // Prompt enhancement
        .route("/prompt/enhance", post(handlers::prompt::enhance))
        .route("/prompt/enhance/stop", post(handlers::prompt::stop))
        // Voice
        .route("/voice/token", get(handlers::voice::token))
        // Credentials
        .route("/tokens/status", get(handlers::tokens::status))
}

/// Signaling proxy routes. Never behind auth.
fn signal_routes() -> Router<AppState> {
    Router::new()
        .route("/voice/signal", get(handlers::voice_signal::signal))
        .route(
            "/voice/signal/*tail",
            get(handlers::voice_signal::signal_tail),
        )
}

/// Create the main Axum router with all routes.
pub fn create_router(ctx: AxumContext, cors: &CorsConfig) -> Router {
    router_with_state(Arc::new(ctx), cors)
}

/// Create the router around existing shared state.
pub fn router_with_state(state: AppState, cors: &CorsConfig) -> Router {
    let mut public = api_routes();
    if let Some(key) = state.settings.effective_public_key() {
        // Store the full header value so the check does not allocate per request
        let expected: Arc<str> = Arc::from(format!("Bearer {key}"));
        public = public.route_layer(middleware::from_fn(move |req: Request, next: Next| {
            let expected = expected.clone();
            async move { validate_bearer(expected, req, next).await }
        }));
    }

    Router::new()
        .route("/health", get(health_check))
        .nest("/v1/public", public.merge(signal_routes()))
        .layer(build_cors_layer(cors))
        .with_state(state)
}

/// Health check endpoint. Never requires auth.
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "voxgate",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Auth middleware: validate Bearer token.
///
/// Returns 401 Unauthorized with `WWW-Authenticate: Bearer` on failure.
async fn validate_bearer(
    expected: Arc<str>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match auth {
        Some(h) if h == expected.as_ref() => Ok(next.run(req).await),
        _ => {
            tracing::warn!(
                path = %req.uri().path(),
                "Unauthorized API request - missing or invalid key"
            );
            let mut res = Response::new(axum::body::Body::empty());
            *res.status_mut() = StatusCode::UNAUTHORIZED;
            res.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                header::HeaderValue::from_static("Bearer"),
            );
            Ok(res)
        }
    }
}
