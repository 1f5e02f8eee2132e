//! Length-prefixed frame transport.
//!
//! One frame is a 4-byte big-endian length followed by that many payload
//! bytes. The transport carries opaque byte blocks; it knows nothing about
//! event semantics. Frame boundaries are exact: a read consumes precisely one
//! frame, never more, never less.

use crate::{Result, WatchError};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Hard cap on frame size (10MB).
pub const MAX_FRAME_SIZE: u32 = 10 * 1024 * 1024;

/// Default maximum frame size for most deployments (1MB).
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 1024 * 1024;

fn truncated(context: &str) -> WatchError {
    WatchError::Transport(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        format!("truncated frame: {context}"),
    ))
}

/// Reads frames from an async byte stream. Single-consumer: reads are not
/// synchronized.
pub struct FrameReader<R> {
    inner: R,
    max_frame_size: u32,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_max_frame_size(inner, DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(inner: R, max_frame_size: u32) -> Self {
        Self {
            inner,
            max_frame_size,
        }
    }

    /// Reads exactly one frame.
    ///
    /// Returns `Ok(None)` on clean close: the remote end shut the connection
    /// at a frame boundary. A close in the middle of a length prefix or a
    /// payload is a truncated frame and therefore a `Transport` error.
    pub async fn read_frame(&mut self) -> Result<Option<Bytes>> {
        // The length prefix is read byte-wise so a clean close (zero bytes
        // before any prefix byte) is distinguishable from truncation.
        let mut prefix = [0u8; 4];
        let mut filled = 0;
        while filled < prefix.len() {
            let n = self.inner.read(&mut prefix[filled..]).await?;
            if n == 0 {
                if filled == 0 {
                    debug!("Stream closed cleanly at frame boundary");
                    return Ok(None);
                }
                return Err(truncated("connection closed inside length prefix"));
            }
            filled += n;
        }

        let length = u32::from_be_bytes(prefix);
        if length > self.max_frame_size {
            warn!(
                "Received oversized frame: {} bytes (max: {})",
                length, self.max_frame_size
            );
            return Err(WatchError::FrameTooLarge(length, self.max_frame_size));
        }

        debug!("Reading frame of {} bytes", length);

        let mut payload = vec![0u8; length as usize];
        self.inner
            .read_exact(&mut payload)
            .await
            .map_err(|_| truncated("connection closed inside payload"))?;

        Ok(Some(Bytes::from(payload)))
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Writes frames to an async byte stream.
///
/// The write path is serialized internally so multiple producers (for example
/// an event writer and a keep-alive writer) can share one writer without
/// interleaving bytes. Each call flushes a complete frame.
pub struct FrameWriter<W> {
    inner: Mutex<W>,
    max_frame_size: u32,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self::with_max_frame_size(inner, DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(inner: W, max_frame_size: u32) -> Self {
        Self {
            inner: Mutex::new(inner),
            max_frame_size,
        }
    }

    /// Writes one frame atomically with respect to other writers.
    pub async fn write_frame(&self, payload: &[u8]) -> Result<()> {
        let length = u32::try_from(payload.len())
            .map_err(|_| WatchError::FrameTooLarge(u32::MAX, self.max_frame_size))?;
        if length > self.max_frame_size {
            return Err(WatchError::FrameTooLarge(length, self.max_frame_size));
        }

        debug!("Writing frame of {} bytes", length);

        let mut inner = self.inner.lock().await;
        inner.write_u32(length).await?;
        inner.write_all(payload).await?;
        inner.flush().await?;

        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner.into_inner()
    }
}

/// Opaque frame codec for use with `tokio_util::codec::Framed`.
pub struct FrameCodec {
    max_frame_size: u32,
}

impl FrameCodec {
    pub fn new(max_frame_size: u32) -> Self {
        Self { max_frame_size }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl tokio_util::codec::Decoder for FrameCodec {
    type Item = Bytes;
    type Error = WatchError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        // Need at least 4 bytes for the length prefix
        if src.len() < 4 {
            return Ok(None);
        }

        // Peek at length without consuming
        let mut length_bytes = [0u8; 4];
        length_bytes.copy_from_slice(&src[..4]);
        let length = u32::from_be_bytes(length_bytes);

        if length > self.max_frame_size {
            warn!(
                "Received oversized frame: {} bytes (max: {})",
                length, self.max_frame_size
            );
            return Err(WatchError::FrameTooLarge(length, self.max_frame_size));
        }

        // Check if we have the full frame
        let frame_size = 4 + length as usize;
        if src.len() < frame_size {
            src.reserve(frame_size - src.len());
            return Ok(None);
        }

        src.advance(4); // Skip length prefix
        let payload = src.split_to(length as usize);

        Ok(Some(payload.freeze()))
    }
}

impl tokio_util::codec::Encoder<Bytes> for FrameCodec {
    type Error = WatchError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        let length = u32::try_from(item.len())
            .map_err(|_| WatchError::FrameTooLarge(u32::MAX, self.max_frame_size))?;
        if length > self.max_frame_size {
            return Err(WatchError::FrameTooLarge(length, self.max_frame_size));
        }

        dst.reserve(4 + item.len());
        dst.put_u32(length);
        dst.put_slice(&item);

        Ok(())
    }
}
