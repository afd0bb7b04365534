//! Axum HTTP and WebSocket adapter for voxgate.
//!
//! Routes live under `/v1/public`. Handlers are thin: they lease credentials
//! from the token pool, run long calls through the task registry, mutate
//! documents through the media library and hand signaling sockets to the
//! relay.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Silence unused dev-dependency warnings; these back the integration tests
#[cfg(test)]
use async_trait as _;
#[cfg(test)]
use http_body_util as _;
#[cfg(test)]
use mockall as _;
#[cfg(test)]
use tokio_test as _;
#[cfg(test)]
use tokio_tungstenite as _;
#[cfg(test)]
use tower as _;

pub mod bootstrap;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod ws_frames;

// Re-export primary types
pub use bootstrap::{AxumContext, CorsConfig, ServerConfig, UpstreamPorts, bootstrap, start_server};
pub use error::HttpError;
pub use routes::{create_router, router_with_state};
pub use state::AppState;
