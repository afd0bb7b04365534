//! Upstream signaling socket.
//!
//! Opens the WebSocket with tokio-tungstenite and splits it into a
//! [`SignalReader`] stream and a [`SignalWriter`] sink speaking relay
//! [`Frame`]s. Pings and pongs are answered by tungstenite and never reach
//! the relay.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{Sink, SinkExt, Stream, StreamExt, ready};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};
use voxgate_core::Frame;
use voxgate_core::utils::mask_url;
use voxgate_runtime::RelayError;

use crate::error::{UpstreamError, UpstreamResult};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Read half of the upstream signaling socket.
pub struct SignalReader {
    inner: SplitStream<WsStream>,
}

/// Write half of the upstream signaling socket.
pub struct SignalWriter {
    inner: SplitSink<WsStream, Message>,
}

fn relay_error(err: tungstenite::Error) -> RelayError {
    match err {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            RelayError::Closed
        }
        other => RelayError::transport(other),
    }
}

/// Frame carried by `message`, `None` for control traffic.
pub(crate) fn message_to_frame(message: Message) -> Option<Frame> {
    match message {
        Message::Text(text) => Some(Frame::Text(text.as_str().to_owned())),
        Message::Binary(data) => Some(Frame::Binary(data)),
        Message::Close(close) => {
            if let Some(cf) = close {
                debug!(code = %cf.code, reason = %cf.reason, "Upstream sent close frame");
            }
            Some(Frame::Close)
        }
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => None,
    }
}

pub(crate) fn frame_to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Binary(data) => Message::Binary(data),
        Frame::Close => Message::Close(None),
    }
}

impl Stream for SignalReader {
    type Item = Result<Frame, RelayError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match ready!(self.inner.poll_next_unpin(cx)) {
                None => return Poll::Ready(None),
                Some(Err(e)) => return Poll::Ready(Some(Err(relay_error(e)))),
                Some(Ok(message)) => {
                    if let Some(frame) = message_to_frame(message) {
                        return Poll::Ready(Some(Ok(frame)));
                    }
                }
            }
        }
    }
}

impl Sink<Frame> for SignalWriter {
    type Error = RelayError;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready_unpin(cx).map_err(relay_error)
    }

    fn start_send(mut self: Pin<&mut Self>, item: Frame) -> Result<(), Self::Error> {
        self.inner
            .start_send_unpin(frame_to_message(item))
            .map_err(relay_error)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_flush_unpin(cx).map_err(relay_error)
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_close_unpin(cx).map_err(relay_error)
    }
}

/// Open the upstream signaling socket at `url`.
///
/// `origin` is sent as the `Origin` header. Fails with
/// [`UpstreamError::SignalTimeout`] if the handshake takes longer than
/// `timeout`.
pub async fn connect_signal(
    url: &str,
    origin: &str,
    timeout: Duration,
) -> UpstreamResult<(SignalReader, SignalWriter)> {
    let masked = mask_url(url);
    info!(upstream = %masked, "Connecting to upstream signaling");

    let uri: tungstenite::http::Uri = url
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| {
            UpstreamError::SignalConnect(e.to_string())
        })?;
    let request = ClientRequestBuilder::new(uri).with_header("Origin", origin);

    let (stream, _response) = tokio::time::timeout(timeout, tokio_tungstenite::connect_async(request))
        .await
        .map_err(|_| UpstreamError::SignalTimeout(timeout))?
        .map_err(|e| UpstreamError::SignalConnect(e.to_string()))?;

    info!(upstream = %masked, "Upstream signaling connected");
    let (writer, reader) = stream.split();
    Ok((SignalReader { inner: reader }, SignalWriter { inner: writer }))
}
