//! WebSocket signaling proxy.
//!
//! `GET /v1/public/voice/signal[/*tail]` upgrades the client connection,
//! opens the matching upstream signaling socket and relays frames both ways
//! until either side ends. Both sockets are closed when the session ends.

use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use tracing::{debug, info, warn};
use voxgate_core::domain::voice::upstream_signal_url;
use voxgate_core::utils::mask_url;
use voxgate_runtime::{RelayEndpoint, relay};
use voxgate_upstream::connect_signal;

use crate::error::HttpError;
use crate::state::AppState;
use crate::ws_frames::client_endpoint;

pub async fn signal(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<Vec<(String, String)>>,
) -> Result<Response, HttpError> {
    upgrade(ws, state, "", &query)
}

pub async fn signal_tail(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(tail): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
) -> Result<Response, HttpError> {
    upgrade(ws, state, &tail, &query)
}

fn upgrade(
    ws: WebSocketUpgrade,
    state: AppState,
    tail: &str,
    query: &[(String, String)],
) -> Result<Response, HttpError> {
    let upstream_override = query
        .iter()
        .find(|(key, _)| key == "upstream")
        .map(|(_, value)| value.as_str());
    let upstream_url = upstream_signal_url(&state.settings.voice, upstream_override, tail, query)?;
    Ok(ws.on_upgrade(move |socket| run_session(socket, state, upstream_url)))
}

async fn run_session(mut socket: WebSocket, state: AppState, upstream_url: String) {
    let masked = mask_url(&upstream_url);
    let timeout = Duration::from_secs(state.settings.voice.connect_timeout_secs);

    let (reader, writer) =
        match connect_signal(&upstream_url, &state.upstream.origin, timeout).await {
            Ok(halves) => halves,
            Err(e) => {
                warn!(upstream = %masked, error = %e, "Voice signal proxy connect failed");
                let close = Message::Close(Some(CloseFrame {
                    code: close_code::ERROR,
                    reason: "upstream connect failed".into(),
                }));
                if let Err(e) = socket.send(close).await {
                    debug!(error = %e, "Client already gone");
                }
                return;
            }
        };

    info!(upstream = %masked, "Voice signal proxy connected");
    match relay(client_endpoint(socket), RelayEndpoint::new(reader, writer)).await {
        Ok(report) => info!(
            upstream = %masked,
            ended_by = ?report.ended_by,
            client_frames = report.inbound_frames,
            upstream_frames = report.outbound_frames,
            "Voice signal proxy closed"
        ),
        // Already logged by the relay
        Err(e) => debug!(upstream = %masked, error = %e, "Voice signal proxy ended with error"),
    }
}
