//! Voice token issuance and the signaling proxy over real sockets.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{MockChat, MockVoice, SECRET, app, send, state_with, test_settings};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request as WsRequest, Response as WsResponse,
};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use voxgate_axum::AppState;
use voxgate_core::UpstreamCallError;

fn voice_state(voice: MockVoice) -> AppState {
    let mut settings = test_settings();
    settings.voice.livekit_url = Some("wss://configured.example.com/".to_string());
    let state = state_with(settings, MockChat::new(), voice);
    state.tokens.add_token("ssoBasic", SECRET);
    state
}

fn token_request() -> Request<Body> {
    Request::builder()
        .uri("/v1/public/voice/token?voice=eve&speed=1.5")
        .header("host", "voxgate.test")
        .header("x-forwarded-proto", "https")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_voice_token_merges_connection_details() {
    let mut voice = MockVoice::new();
    voice
        .expect_issue_voice_token()
        .withf(|secret, params| {
            secret == SECRET && params.voice == "eve" && (params.speed - 1.5).abs() < f32::EPSILON
        })
        .times(1)
        .returning(|_, _| {
            Ok(json!({
                "token": "lk-token",
                "livekitUrl": "wss://upstream.example.com",
                "roomName": "room-7",
                "participantName": "guest",
                "rtcConfig": {"iceServers": [{"urls": "stun:stun.example.com:3478"}]}
            }))
        });
    let state = voice_state(voice);

    let (status, _, body) = send(app(&state), token_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token"], "lk-token");
    assert_eq!(body["url"], "wss://configured.example.com");
    assert_eq!(
        body["urls"],
        json!([
            "wss://configured.example.com",
            "wss://upstream.example.com",
            "wss://livekit.grok.com"
        ])
    );
    assert_eq!(body["room_name"], "room-7");
    assert_eq!(body["participant_name"], "guest");
    assert_eq!(
        body["ice_servers"][0]["urls"],
        json!(["stun:stun.example.com:3478"])
    );
    assert_eq!(
        body["signal_proxy_url"],
        "wss://voxgate.test/v1/public/voice/signal"
    );
}

#[tokio::test]
async fn test_voice_token_without_token_is_bad_gateway() {
    let mut voice = MockVoice::new();
    voice
        .expect_issue_voice_token()
        .returning(|_, _| Ok(json!({"roomName": "r"})));
    let (status, _, body) = send(app(&voice_state(voice)), token_request()).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["status"], 502);
}

#[tokio::test]
async fn test_rejected_credential_is_retired() {
    let mut voice = MockVoice::new();
    voice
        .expect_issue_voice_token()
        .times(1)
        .returning(|_, _| Err(UpstreamCallError::Rejected { status: 401 }));
    let state = voice_state(voice);

    let (status, _, _) = send(app(&state), token_request()).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let (status, _, _) = send(app(&state), token_request()).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

/// What the fake upstream signaling server observed.
#[derive(Debug, Default)]
struct Observed {
    uri: Option<String>,
    origin: Option<String>,
}

/// Echo server that reports its handshake and the close it receives.
async fn spawn_upstream() -> (u16, Arc<Mutex<Observed>>, oneshot::Receiver<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let observed = Arc::new(Mutex::new(Observed::default()));
    let (closed_tx, closed_rx) = oneshot::channel();

    let seen = Arc::clone(&observed);
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let callback = |request: &WsRequest, response: WsResponse| {
            let mut seen = seen.lock().unwrap();
            seen.uri = Some(request.uri().to_string());
            seen.origin = request
                .headers()
                .get("origin")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            Ok::<_, ErrorResponse>(response)
        };
        let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
            .await
            .unwrap();
        while let Some(Ok(message)) = ws.next().await {
            match message {
                Message::Text(_) | Message::Binary(_) => {
                    if ws.send(message).await.is_err() {
                        break;
                    }
                }
                Message::Close(_) => {
                    let _ = closed_tx.send(());
                    break;
                }
                _ => {}
            }
        }
    });

    (port, observed, closed_rx)
}

async fn spawn_proxy(state: &AppState) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let router = app(state);
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    port
}

#[tokio::test]
async fn test_signal_proxy_relays_both_ways() {
    let (upstream_port, observed, closed) = spawn_upstream().await;
    let proxy_port = spawn_proxy(&voice_state(MockVoice::new())).await;

    let url = format!(
        "ws://127.0.0.1:{proxy_port}/v1/public/voice/signal/rtc\
         ?upstream=ws://127.0.0.1:{upstream_port}&access_token=abc"
    );
    let (mut client, _) = tokio_tungstenite::connect_async(url).await.unwrap();

    client.send(Message::Text("join".into())).await.unwrap();
    let echoed = tokio::time::timeout(Duration::from_secs(5), client.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(echoed, Message::Text("join".into()));

    client
        .send(Message::Binary(vec![0_u8, 1, 2, 255].into()))
        .await
        .unwrap();
    let echoed = tokio::time::timeout(Duration::from_secs(5), client.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(echoed, Message::Binary(vec![0_u8, 1, 2, 255].into()));

    {
        let seen = observed.lock().unwrap();
        assert_eq!(seen.uri.as_deref(), Some("/rtc?access_token=abc"));
        assert_eq!(seen.origin.as_deref(), Some("https://grok.com"));
    }

    client.close(None).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), closed)
        .await
        .expect("upstream should see the close")
        .unwrap();
}

#[tokio::test]
async fn test_unreachable_upstream_closes_client_with_error() {
    let dead_port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let proxy_port = spawn_proxy(&voice_state(MockVoice::new())).await;

    let url = format!(
        "ws://127.0.0.1:{proxy_port}/v1/public/voice/signal?upstream=ws://127.0.0.1:{dead_port}"
    );
    let (mut client, _) = tokio_tungstenite::connect_async(url).await.unwrap();

    let message = tokio::time::timeout(Duration::from_secs(5), client.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    match message {
        Message::Close(Some(frame)) => assert_eq!(frame.code, CloseCode::Error),
        other => panic!("expected close frame, got {other:?}"),
    }
}
