//! Per-connection request handling.
//!
//! A connection carries exactly one request:
//!
//! 1. read the command frame and parse it,
//! 2. read the image frame and decode it,
//! 3. run the transform,
//! 4. encode the result in the source format and write one response frame.
//!
//! The first failure ends the connection. No error frame is ever sent;
//! the client only sees the socket close. Decode, transform and encode
//! are CPU-bound and run on the blocking pool.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use crate::codec::FrameCodec;
use crate::command::Command;
use crate::error::PixwireError;
use crate::format::{Encoding, ImageCodec};
use crate::frame::{LENGTH_PREFIX_SIZE, MAX_FRAME_SIZE};
use crate::state::ConnectionStage;
use crate::transform;

/// Default deadline for each frame read and for the response write.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(30);

// ── HandlerConfig ────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// Ceiling for either inbound frame. Responses are only held to
    /// [`MAX_FRAME_SIZE`], since re-encoding may legitimately grow them.
    pub max_frame_size: usize,
    /// Deadline for each inbound frame.
    pub read_timeout: Duration,
    /// Deadline for writing the response frame.
    pub write_timeout: Duration,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
            read_timeout: DEFAULT_IO_TIMEOUT,
            write_timeout: DEFAULT_IO_TIMEOUT,
        }
    }
}

// ── RequestSummary ───────────────────────────────────────────────

/// What a successfully served request did.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSummary {
    pub command: Command,
    pub encoding: Encoding,
    pub input_size: (u32, u32),
    pub output_size: (u32, u32),
    pub bytes_in: usize,
    pub bytes_out: usize,
    pub elapsed: Duration,
}

// ── ConnectionHandler ────────────────────────────────────────────

/// Runs the request state machine over one stream.
///
/// Cheap to clone; every worker holds its own copy.
#[derive(Clone)]
pub struct ConnectionHandler {
    codec: Arc<dyn ImageCodec>,
    config: HandlerConfig,
}

impl ConnectionHandler {
    pub fn new(codec: Arc<dyn ImageCodec>, config: HandlerConfig) -> Self {
        Self { codec, config }
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    /// Serve one request on `stream`, then close it.
    ///
    /// The stream is consumed, so it is dropped (and the socket closed)
    /// on every return path.
    pub async fn handle<S>(&self, stream: S) -> Result<RequestSummary, PixwireError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let started = Instant::now();
        let codec = FrameCodec::new(self.config.max_frame_size).with_max_encode_size(MAX_FRAME_SIZE);
        let mut framed = Framed::new(stream, codec);
        let mut stage = ConnectionStage::default();

        let result = self.serve(&mut framed, &mut stage, started).await;

        match &result {
            Ok(summary) => {
                info!(
                    command = %summary.command,
                    encoding = %summary.encoding,
                    input = ?summary.input_size,
                    output = ?summary.output_size,
                    bytes_out = summary.bytes_out,
                    elapsed_ms = summary.elapsed.as_millis() as u64,
                    "request served"
                );
            }
            Err(e) => {
                warn!(%stage, category = %e.category(), "closing connection: {e}");
            }
        }

        stage.finish();
        // A peer that stopped reading never drains the flush.
        match tokio::time::timeout(self.config.write_timeout, SinkExt::<Bytes>::close(&mut framed))
            .await
        {
            Ok(Err(e)) => debug!("error while closing connection: {e}"),
            Err(_) => debug!("close timed out; dropping connection"),
            Ok(Ok(())) => {}
        }
        result
    }

    async fn serve<S>(
        &self,
        framed: &mut Framed<S, FrameCodec>,
        stage: &mut ConnectionStage,
        started: Instant,
    ) -> Result<RequestSummary, PixwireError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        // AwaitCommand
        let text = self.next_frame(framed).await?;
        let text = String::from_utf8(text.to_vec())?;
        let command: Command = text.parse()?;
        debug!(%command, "command received");
        stage.advance()?;

        // AwaitImage
        let image_bytes = self.next_frame(framed).await?;
        let bytes_in = image_bytes.len();
        let codec = Arc::clone(&self.codec);
        let (source, encoding) =
            tokio::task::spawn_blocking(move || codec.decode(&image_bytes)).await??;
        debug!(%encoding, width = source.width(), height = source.height(), "image decoded");
        stage.advance()?;

        // Process
        let input_size = source.dimensions();
        let result = tokio::task::spawn_blocking(move || transform::apply(&command, &source)).await??;
        let output_size = result.dimensions();
        stage.advance()?;

        // Respond
        let codec = Arc::clone(&self.codec);
        let encoded = tokio::task::spawn_blocking(move || codec.encode(&result, encoding)).await??;
        let bytes_out = encoded.len();
        self.send_frame(framed, Bytes::from(encoded)).await?;
        stage.advance()?;

        Ok(RequestSummary {
            command,
            encoding,
            input_size,
            output_size,
            bytes_in,
            bytes_out,
            elapsed: started.elapsed(),
        })
    }

    async fn next_frame<S>(&self, framed: &mut Framed<S, FrameCodec>) -> Result<Bytes, PixwireError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match tokio::time::timeout(self.config.read_timeout, framed.next()).await {
            Err(_) => Err(PixwireError::Timeout(self.config.read_timeout)),
            Ok(None) => Err(PixwireError::ShortRead {
                expected: LENGTH_PREFIX_SIZE,
                actual: 0,
            }),
            Ok(Some(frame)) => frame,
        }
    }

    async fn send_frame<S>(
        &self,
        framed: &mut Framed<S, FrameCodec>,
        payload: Bytes,
    ) -> Result<(), PixwireError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match tokio::time::timeout(self.config.write_timeout, framed.send(payload)).await {
            Err(_) => Err(PixwireError::Timeout(self.config.write_timeout)),
            Ok(Err(PixwireError::Io(e))) => Err(PixwireError::Write(e)),
            Ok(other) => other,
        }
    }
}
