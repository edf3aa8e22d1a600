//! Stdio bus adapter.
//!
//! Bridges the engine to an external broker process over NDJSON:
//!
//! - outbound, one frame per line on stdout:
//!   `{"topic": "front-end", "qos": 3, "payload": {...envelope...}}`
//! - inbound, one frame per line on stdin: either a bare envelope, or
//!   `{"topic": "back-end", "payload": {...envelope...}}`.
//!
//! Empty lines are skipped. Lines over the size limit are discarded with a
//! warning and reading continues.

use bytes::Bytes;
use futures_util::StreamExt;
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tracing::{trace, warn};

use super::{BusGateway, GatewayType, Result};
use crate::error::GatewayError;

/// Default maximum inbound frame size in bytes (10 MB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 10 * 1024 * 1024;

// ============================================================================
// Outbound
// ============================================================================

#[derive(Serialize)]
struct OutboundFrame<'a> {
    topic: &'a str,
    qos: u8,
    payload: Value,
}

/// Gateway writing publish frames to an async writer (stdout by default).
///
/// The writer sits behind a `tokio::sync::Mutex` because the lock is held
/// across the write and flush awaits.
pub struct StdioGateway<W = tokio::io::Stdout> {
    writer: Mutex<BufWriter<W>>,
}

impl StdioGateway {
    /// Gateway over the process's stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W: AsyncWrite + Unpin> StdioGateway<W> {
    /// Gateway over any writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
        }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner().into_inner()
    }
}

impl<W> std::fmt::Debug for StdioGateway<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioGateway").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl<W: AsyncWrite + Unpin + Send + Sync> BusGateway for StdioGateway<W> {
    async fn publish(&self, topic: &str, payload: Bytes, delivery_level: u8) -> Result<()> {
        // Envelopes are embedded as JSON; anything else travels as a string.
        let payload = serde_json::from_slice(&payload)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&payload).into_owned()));
        let frame = OutboundFrame {
            topic,
            qos: delivery_level,
            payload,
        };
        let line = serde_json::to_vec(&frame)?;

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        drop(writer);
        Ok(())
    }

    fn gateway_type(&self) -> GatewayType {
        GatewayType::Stdio
    }
}

// ============================================================================
// Inbound
// ============================================================================

/// One inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    /// Topic the payload arrived on, when the bridge reports it
    pub topic: Option<String>,
    /// Raw envelope bytes
    pub payload: Bytes,
}

impl InboundFrame {
    /// Parses one non-empty line.
    ///
    /// Lines that are not topic-wrapped frames are passed through whole,
    /// leaving decode errors to the router.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let passthrough = || Self {
            topic: None,
            payload: Bytes::copy_from_slice(line.as_bytes()),
        };

        let Ok(Value::Object(mut object)) = serde_json::from_str::<Value>(line) else {
            return passthrough();
        };
        if object.contains_key("device_id") || !object.contains_key("payload") {
            return passthrough();
        }

        let topic = object
            .remove("topic")
            .and_then(|t| t.as_str().map(str::to_owned));
        let payload = match object.remove("payload") {
            Some(Value::String(text)) => Bytes::from(text),
            Some(other) => Bytes::from(other.to_string()),
            None => Bytes::new(),
        };
        Self { topic, payload }
    }
}

/// Reads inbound frames line by line from an async reader (stdin by
/// default).
pub struct FrameReader<R> {
    lines: FramedRead<R, LinesCodec>,
}

impl FrameReader<tokio::io::Stdin> {
    /// Reader over the process's stdin.
    #[must_use]
    pub fn stdin() -> Self {
        Self::new(tokio::io::stdin(), DEFAULT_MAX_FRAME_SIZE)
    }
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Reader over any source with a per-line size limit.
    pub fn new(reader: R, max_frame_size: usize) -> Self {
        Self {
            lines: FramedRead::new(reader, LinesCodec::new_with_max_length(max_frame_size)),
        }
    }

    /// Next frame, or `Ok(None)` at end of input.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Io`] if the underlying read fails.
    pub async fn next_frame(&mut self) -> Result<Option<InboundFrame>> {
        let mut recovering = false;
        loop {
            match self.lines.next().await {
                // After a decode error the stream yields one `None`, then resumes.
                None if recovering => recovering = false,
                None => return Ok(None),
                Some(Ok(line)) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    trace!(bytes = trimmed.len(), "frame received");
                    return Ok(Some(InboundFrame::parse(trimmed)));
                }
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                    warn!("inbound frame exceeds size limit, skipping");
                    recovering = true;
                }
                Some(Err(LinesCodecError::Io(e))) => return Err(GatewayError::Io(e)),
            }
        }
    }
}

impl<R> std::fmt::Debug for FrameReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameReader").finish_non_exhaustive()
    }
}
