//! Bidirectional frame relay.
//!
//! Two pumps run in one task: inbound to outbound and outbound to inbound.
//! The first one to stop ends the session. The other pump is dropped on the
//! spot and both writers are closed once, so no direction keeps flowing
//! after its partner has gone.

use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::Serialize;
use tracing::{debug, warn};
use voxgate_core::Frame;

/// Upper bound on closing one writer during teardown.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RelayError {
    /// The underlying connection failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A send hit a connection that is already closed.
    #[error("Connection already closed")]
    Closed,
}

impl RelayError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Which connection of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelaySide {
    /// The client that opened the session.
    Inbound,
    /// The upstream connection opened on its behalf.
    Outbound,
}

/// One duplex connection split into its read and write halves.
pub struct RelayEndpoint<R, W> {
    pub reader: R,
    pub writer: W,
}

impl<R, W> RelayEndpoint<R, W> {
    pub const fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }
}

/// Summary of a session that ended cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelayReport {
    /// Side whose read half ended the session.
    pub ended_by: RelaySide,
    /// Frames forwarded from inbound to outbound.
    pub inbound_frames: u64,
    /// Frames forwarded from outbound to inbound.
    pub outbound_frames: u64,
}

/// Forward frames until the reader closes, ends or errors.
async fn pump<R, W>(reader: &mut R, writer: &mut W, forwarded: &mut u64) -> Result<(), RelayError>
where
    R: Stream<Item = Result<Frame, RelayError>> + Unpin,
    W: Sink<Frame, Error = RelayError> + Unpin,
{
    while let Some(frame) = reader.next().await {
        let frame = frame?;
        if frame.is_close() {
            return Ok(());
        }
        writer.send(frame).await?;
        *forwarded += 1;
    }
    Ok(())
}

async fn close_writer<W>(writer: &mut W, side: RelaySide)
where
    W: Sink<Frame, Error = RelayError> + Unpin,
{
    match tokio::time::timeout(CLOSE_TIMEOUT, writer.close()).await {
        Ok(Ok(())) => {}
        // Closing a socket the peer already dropped is expected.
        Ok(Err(e)) => debug!(?side, error = %e, "Ignoring error while closing"),
        Err(_) => warn!(?side, "Timed out closing connection"),
    }
}

/// Relay frames between `inbound` and `outbound` until either side ends.
///
/// Frames keep their type and per-direction order. On return both writers
/// have been closed and neither pump is running. The terminating error, if
/// any, is returned for the caller to log.
pub async fn relay<R1, W1, R2, W2>(
    inbound: RelayEndpoint<R1, W1>,
    outbound: RelayEndpoint<R2, W2>,
) -> Result<RelayReport, RelayError>
where
    R1: Stream<Item = Result<Frame, RelayError>> + Unpin,
    W1: Sink<Frame, Error = RelayError> + Unpin,
    R2: Stream<Item = Result<Frame, RelayError>> + Unpin,
    W2: Sink<Frame, Error = RelayError> + Unpin,
{
    let RelayEndpoint {
        reader: mut inbound_reader,
        writer: mut inbound_writer,
    } = inbound;
    let RelayEndpoint {
        reader: mut outbound_reader,
        writer: mut outbound_writer,
    } = outbound;

    let mut inbound_frames = 0_u64;
    let mut outbound_frames = 0_u64;

    let (ended_by, result) = {
        let upstream = pump(&mut inbound_reader, &mut outbound_writer, &mut inbound_frames);
        let downstream = pump(&mut outbound_reader, &mut inbound_writer, &mut outbound_frames);
        tokio::select! {
            result = upstream => (RelaySide::Inbound, result),
            result = downstream => (RelaySide::Outbound, result),
        }
    };

    tokio::join!(
        close_writer(&mut inbound_writer, RelaySide::Inbound),
        close_writer(&mut outbound_writer, RelaySide::Outbound),
    );

    match result {
        Ok(()) => {
            debug!(
                ?ended_by,
                inbound_frames, outbound_frames, "Relay session closed"
            );
            Ok(RelayReport {
                ended_by,
                inbound_frames,
                outbound_frames,
            })
        }
        Err(e) => {
            warn!(?ended_by, error = %e, "Relay session failed");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures_util::stream;
    use tokio::sync::mpsc;
    use tokio_util::sync::PollSender;

    type Reader = std::pin::Pin<Box<dyn Stream<Item = Result<Frame, RelayError>> + Send>>;

    fn reader(rx: mpsc::Receiver<Result<Frame, RelayError>>) -> Reader {
        Box::pin(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        }))
    }

    fn writer(tx: mpsc::Sender<Frame>) -> impl Sink<Frame, Error = RelayError> + Unpin {
        PollSender::new(tx).sink_map_err(|_| RelayError::Closed)
    }

    #[tokio::test]
    async fn test_frames_forwarded_verbatim_both_ways() {
        let (client_in_tx, client_in_rx) = mpsc::channel(8);
        let (client_out_tx, mut client_out_rx) = mpsc::channel(8);
        let (up_in_tx, up_in_rx) = mpsc::channel(8);
        let (up_out_tx, mut up_out_rx) = mpsc::channel(8);

        let session = tokio::spawn(relay(
            RelayEndpoint::new(reader(client_in_rx), writer(client_out_tx)),
            RelayEndpoint::new(reader(up_in_rx), writer(up_out_tx)),
        ));

        client_in_tx.send(Ok(Frame::Text("hello".into()))).await.unwrap();
        client_in_tx
            .send(Ok(Frame::Binary(Bytes::from_static(b"\x00\x01"))))
            .await
            .unwrap();
        assert_eq!(up_out_rx.recv().await, Some(Frame::Text("hello".into())));
        assert_eq!(
            up_out_rx.recv().await,
            Some(Frame::Binary(Bytes::from_static(b"\x00\x01")))
        );

        up_in_tx.send(Ok(Frame::Text("welcome".into()))).await.unwrap();
        assert_eq!(client_out_rx.recv().await, Some(Frame::Text("welcome".into())));

        up_in_tx.send(Ok(Frame::Close)).await.unwrap();
        let report = session.await.unwrap().unwrap();
        assert_eq!(report.ended_by, RelaySide::Outbound);
        assert_eq!(report.inbound_frames, 2);
        assert_eq!(report.outbound_frames, 1);

        // Both writers were closed.
        assert_eq!(client_out_rx.recv().await, None);
        assert_eq!(up_out_rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inbound_close_mid_stream_tears_down_outbound() {
        let (client_in_tx, client_in_rx) = mpsc::channel(8);
        let (client_out_tx, mut client_out_rx) = mpsc::channel(1024);
        let (up_in_tx, up_in_rx) = mpsc::channel(8);
        let (up_out_tx, mut up_out_rx) = mpsc::channel(8);

        // Upstream streams frames until nobody is listening any more.
        let producer = tokio::spawn(async move {
            let mut sent = 0_u32;
            while up_in_tx
                .send(Ok(Frame::Text(format!("chunk {sent}"))))
                .await
                .is_ok()
            {
                sent += 1;
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            sent
        });

        let session = tokio::spawn(relay(
            RelayEndpoint::new(reader(client_in_rx), writer(client_out_tx)),
            RelayEndpoint::new(reader(up_in_rx), writer(up_out_tx)),
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        client_in_tx.send(Ok(Frame::Close)).await.unwrap();

        let report = tokio::time::timeout(Duration::from_millis(10), session)
            .await
            .expect("relay should end promptly")
            .unwrap()
            .unwrap();
        assert_eq!(report.ended_by, RelaySide::Inbound);
        assert!(report.outbound_frames > 0);

        // Outbound writer closed, and the outbound reader was dropped so the
        // producer notices the session is gone.
        assert_eq!(up_out_rx.recv().await, None);
        let sent = tokio::time::timeout(Duration::from_millis(50), producer)
            .await
            .expect("producer should stop")
            .unwrap();
        assert!(sent > 0);

        while let Some(frame) = client_out_rx.recv().await {
            assert!(matches!(frame, Frame::Text(_)));
        }
    }

    #[tokio::test]
    async fn test_transport_error_is_returned_and_both_sides_closed() {
        let (client_in_tx, client_in_rx) = mpsc::channel(8);
        let (client_out_tx, mut client_out_rx) = mpsc::channel(8);
        let (_up_in_tx, up_in_rx) = mpsc::channel(8);
        let (up_out_tx, mut up_out_rx) = mpsc::channel(8);

        let session = tokio::spawn(relay(
            RelayEndpoint::new(reader(client_in_rx), writer(client_out_tx)),
            RelayEndpoint::new(reader(up_in_rx), writer(up_out_tx)),
        ));

        client_in_tx
            .send(Err(RelayError::transport("connection reset")))
            .await
            .unwrap();
        let err = session.await.unwrap().unwrap_err();
        assert_eq!(err, RelayError::Transport("connection reset".into()));
        assert_eq!(client_out_rx.recv().await, None);
        assert_eq!(up_out_rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_end_of_stream_counts_as_clean_close() {
        let (client_in_tx, client_in_rx) = mpsc::channel::<Result<Frame, RelayError>>(8);
        let (client_out_tx, _client_out_rx) = mpsc::channel(8);
        let (_up_in_tx, up_in_rx) = mpsc::channel(8);
        let (up_out_tx, _up_out_rx) = mpsc::channel(8);

        drop(client_in_tx);
        let report = relay(
            RelayEndpoint::new(reader(client_in_rx), writer(client_out_tx)),
            RelayEndpoint::new(reader(up_in_rx), writer(up_out_tx)),
        )
        .await
        .unwrap();
        assert_eq!(report.ended_by, RelaySide::Inbound);
        assert_eq!(report.inbound_frames, 0);
    }
}
