//! Connection plumbing – frame reader, outbound sender, and the agent loop.
//!
//! ## Tasks
//!
//! | Task          | Owns                         | Ends when                          |
//! |---------------|------------------------------|------------------------------------|
//! | receive loop  | [`FrameReader`]              | stream EOF, I/O error, ctrl-c      |
//! | tick loop     | `tokio::time::interval`      | receive loop ends                  |
//! | writer task   | write half + mpsc receiver   | every [`OutboundSender`] dropped   |
//!
//! Decoding and store application happen synchronously on the receive loop,
//! so frame order is preserved end to end.  Outbound sends never run on the
//! receive loop; callers hand frames to the writer task through
//! [`OutboundSender::send`].

use crate::protocol::{self, Command, FrameError, SERVER_HEADER_LEN};
use crate::service::MirrorService;
use anyhow::{Context, Result};
use bytes::{Bytes, BytesMut};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Cooperative cancellation shared by clones.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called on any clone.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // The sender lives in `self`, so this only returns once cancelled.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Inbound frames
// ---------------------------------------------------------------------------

/// One server → client message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub opcode: u16,
    pub payload: Bytes,
}

/// Splits a byte stream into [`Frame`]s.
pub struct FrameReader<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// The next frame, or `None` on a clean end of stream between frames.
    pub async fn next_frame(&mut self) -> Result<Option<Frame>, FrameError> {
        let mut header = [0u8; SERVER_HEADER_LEN];
        let got = self.fill(&mut header).await?;
        if got == 0 {
            return Ok(None);
        }
        if got < SERVER_HEADER_LEN {
            return Err(FrameError::UnexpectedEof {
                missing: SERVER_HEADER_LEN - got,
            });
        }

        let (opcode, len) = protocol::parse_server_header(header)?;
        let mut payload = BytesMut::zeroed(len);
        let got = self.fill(&mut payload).await?;
        if got < len {
            return Err(FrameError::UnexpectedEof {
                missing: len - got,
            });
        }
        Ok(Some(Frame {
            opcode,
            payload: payload.freeze(),
        }))
    }

    /// Read until `buf` is full or the stream ends.  Returns bytes read.
    async fn fill(&mut self, buf: &mut [u8]) -> Result<usize, FrameError> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.inner.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }
}

// ---------------------------------------------------------------------------
// Outbound frames
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SendError {
    #[error("send cancelled")]
    Cancelled,
    #[error("connection writer has shut down")]
    Closed,
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Handle for queueing client → server frames to the writer task.
#[derive(Debug, Clone)]
pub struct OutboundSender {
    tx: mpsc::Sender<Bytes>,
}

impl OutboundSender {
    /// Frame `payload` and queue it.  Resolves once the writer task has
    /// accepted the frame, or immediately on cancellation.
    pub async fn send(
        &self,
        opcode: u32,
        payload: &[u8],
        cancel: &CancelToken,
    ) -> Result<(), SendError> {
        if cancel.is_cancelled() {
            return Err(SendError::Cancelled);
        }
        let frame = Bytes::from(protocol::encode_client_frame(opcode, payload)?);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SendError::Cancelled),
            sent = self.tx.send(frame) => sent.map_err(|_| SendError::Closed),
        }
    }

    pub async fn send_command(
        &self,
        command: &Command,
        cancel: &CancelToken,
    ) -> Result<(), SendError> {
        let (opcode, payload) = command.encode();
        debug!("sending {}", command.name());
        self.send(opcode, &payload, cancel).await
    }
}

/// Spawn the writer task.  It exits once every sender is dropped.
pub fn spawn_writer<W>(
    mut writer: W,
    buffer: usize,
) -> (OutboundSender, JoinHandle<std::io::Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<Bytes>(buffer.max(1));
    let handle = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            writer.write_all(&frame).await?;
            writer.flush().await?;
        }
        writer.shutdown().await
    });
    (OutboundSender { tx }, handle)
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// `host:port` of a plaintext frame source.
    pub endpoint: String,
    /// Outbound frames buffered before `send` waits.
    pub outbound_buffer: usize,
    /// How often the agent logs mirror stats.
    pub stats_interval: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            endpoint: "127.0.0.1:8085".into(),
            outbound_buffer: 64,
            stats_interval: Duration::from_secs(30),
        }
    }
}

/// Drives a [`MirrorService`] from a frame stream.
///
/// Call [`ConnectionAgent::connect`] then [`ConnectionAgent::run`] inside a
/// Tokio runtime.
pub struct ConnectionAgent {
    config: ConnectionConfig,
    service: Arc<MirrorService>,
}

impl ConnectionAgent {
    pub fn new(config: ConnectionConfig, service: Arc<MirrorService>) -> Self {
        Self { config, service }
    }

    pub fn service(&self) -> &Arc<MirrorService> {
        &self.service
    }

    /// Open the TCP connection and start the writer task.
    pub async fn connect(
        &self,
    ) -> Result<(
        FrameReader<OwnedReadHalf>,
        OutboundSender,
        JoinHandle<std::io::Result<()>>,
    )> {
        info!("connecting to {}", self.config.endpoint);
        let stream = TcpStream::connect(&self.config.endpoint)
            .await
            .with_context(|| format!("Failed to connect to {}", self.config.endpoint))?;
        stream.set_nodelay(true).context("Failed to set TCP_NODELAY")?;

        let (read, write) = stream.into_split();
        let (sender, writer) = spawn_writer(write, self.config.outbound_buffer);
        Ok((FrameReader::new(read), sender, writer))
    }

    /// Mirror frames from `reader` until the stream closes or ctrl-c.
    ///
    /// Decode problems never end the loop; only transport errors do.
    pub async fn run<R: AsyncRead + Unpin>(&self, mut reader: FrameReader<R>) -> Result<()> {
        let tick_handle = self.spawn_tick_loop();

        let result = loop {
            tokio::select! {
                frame = reader.next_frame() => match frame {
                    Ok(Some(frame)) => {
                        self.service.handle_frame(frame.opcode, &frame.payload);
                    }
                    Ok(None) => {
                        info!("frame stream closed by peer");
                        break Ok(());
                    }
                    Err(e) => break Err(e).context("Failed to read frame"),
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("ConnectionAgent shutting down (SIGINT)");
                    break Ok(());
                }
            }
        };

        tick_handle.abort();
        // Apply anything a deferred-mode tick had not reached yet.
        self.service.tick(Instant::now());
        result
    }

    fn spawn_tick_loop(&self) -> JoinHandle<()> {
        let service = self.service.clone();
        let tick_interval = service.config().tick_interval();
        let stats_interval = self.config.stats_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick_interval);
            let mut stats_timer = tokio::time::interval(stats_interval);
            // Both intervals fire immediately; skip the empty first report.
            stats_timer.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = service.tick(Instant::now());
                        if report.casts_expiring > 0 {
                            debug!(
                                "tick {}: {} stuck cast(s) expiring",
                                report.tick, report.casts_expiring
                            );
                        }
                    }
                    _ = stats_timer.tick() => match serde_json::to_string(&service.stats()) {
                        Ok(json) => info!("mirror stats {}", json),
                        Err(e) => warn!("Failed to serialise stats: {}", e),
                    },
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcodes::cmsg;

    #[test]
    fn cancelled_token_rejects_send() {
        tokio_test::block_on(async {
            let (tx, _rx) = mpsc::channel(1);
            let sender = OutboundSender { tx };
            let cancel = CancelToken::new();
            cancel.cancel();
            let err = sender.send(cmsg::LOOT, &[0; 8], &cancel).await.unwrap_err();
            assert!(matches!(err, SendError::Cancelled));
        });
    }

    #[test]
    fn cancel_unblocks_a_full_queue() {
        tokio_test::block_on(async {
            let (tx, _rx) = mpsc::channel(1);
            let sender = OutboundSender { tx };
            let cancel = CancelToken::new();
            sender.send(cmsg::ATTACKSTOP, &[], &cancel).await.unwrap();

            let canceller = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                canceller.cancel();
            });
            let err = sender.send(cmsg::ATTACKSTOP, &[], &cancel).await.unwrap_err();
            assert!(matches!(err, SendError::Cancelled));
        });
    }

    #[test]
    fn closed_writer_is_reported() {
        tokio_test::block_on(async {
            let (tx, rx) = mpsc::channel(1);
            drop(rx);
            let sender = OutboundSender { tx };
            let err = sender
                .send(cmsg::ATTACKSTOP, &[], &CancelToken::new())
                .await
                .unwrap_err();
            assert!(matches!(err, SendError::Closed));
        });
    }
}
