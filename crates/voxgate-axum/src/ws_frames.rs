//! Relay adapters for the client side of a signaling session.
//!
//! Wraps the split halves of an axum [`WebSocket`] so they speak
//! [`Frame`]s. Ping and pong are handled by axum and never forwarded.

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{Sink, SinkExt, Stream, StreamExt, ready};
use voxgate_core::Frame;
use voxgate_runtime::{RelayEndpoint, RelayError};

/// Read half of a client socket.
pub struct ClientFrames {
    inner: SplitStream<WebSocket>,
}

/// Write half of a client socket.
pub struct ClientSink {
    inner: SplitSink<WebSocket, Message>,
}

/// Split `socket` into a relay endpoint.
pub fn client_endpoint(socket: WebSocket) -> RelayEndpoint<ClientFrames, ClientSink> {
    let (writer, reader) = socket.split();
    RelayEndpoint::new(ClientFrames { inner: reader }, ClientSink { inner: writer })
}

pub(crate) fn message_to_frame(message: Message) -> Option<Frame> {
    match message {
        Message::Text(text) => Some(Frame::Text(text)),
        Message::Binary(data) => Some(Frame::Binary(Bytes::from(data))),
        Message::Close(_) => Some(Frame::Close),
        Message::Ping(_) | Message::Pong(_) => None,
    }
}

pub(crate) fn frame_to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text),
        Frame::Binary(data) => Message::Binary(data.to_vec()),
        Frame::Close => Message::Close(None),
    }
}

impl Stream for ClientFrames {
    type Item = Result<Frame, RelayError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match ready!(self.inner.poll_next_unpin(cx)) {
                None => return Poll::Ready(None),
                Some(Err(e)) => return Poll::Ready(Some(Err(RelayError::transport(e)))),
                Some(Ok(message)) => {
                    if let Some(frame) = message_to_frame(message) {
                        return Poll::Ready(Some(Ok(frame)));
                    }
                }
            }
        }
    }
}

impl Sink<Frame> for ClientSink {
    type Error = RelayError;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready_unpin(cx).map_err(RelayError::transport)
    }

    fn start_send(mut self: Pin<&mut Self>, item: Frame) -> Result<(), Self::Error> {
        self.inner
            .start_send_unpin(frame_to_message(item))
            .map_err(RelayError::transport)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_flush_unpin(cx).map_err(RelayError::transport)
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_close_unpin(cx).map_err(RelayError::transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_keep_type() {
        assert_eq!(
            message_to_frame(Message::Text("offer".into())),
            Some(Frame::Text("offer".into()))
        );
        assert_eq!(
            message_to_frame(Message::Binary(vec![0])),
            Some(Frame::Binary(Bytes::from_static(b"\x00")))
        );
        assert_eq!(message_to_frame(Message::Ping(Vec::new())), None);
        assert_eq!(message_to_frame(Message::Close(None)), Some(Frame::Close));
    }

    #[test]
    fn test_close_frame_round_trip() {
        assert!(matches!(frame_to_message(Frame::Close), Message::Close(None)));
        assert!(matches!(
            frame_to_message(Frame::Text("answer".into())),
            Message::Text(t) if t == "answer"
        ));
    }
}
