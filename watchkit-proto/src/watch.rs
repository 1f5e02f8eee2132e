//! Watch stream decoder and encoder over a framed transport.

use crate::event::{Event, EventCodec};
use crate::framing::{FrameReader, FrameWriter, DEFAULT_MAX_FRAME_SIZE};
use crate::scheme::Scheme;
use crate::Result;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, trace};

/// Consumes an inbound byte stream and reconstitutes typed events in arrival
/// order.
///
/// One instance is driven by one task: `next` takes `&mut self`, so the
/// single-owner discipline is enforced by the borrow checker. Reconnection is
/// the caller's job; the decoder never retries, because only the caller knows
/// the resource version to resume from.
pub struct WatchDecoder<R> {
    reader: FrameReader<R>,
    codec: EventCodec,
    terminated: bool,
}

impl<R: AsyncRead + Unpin> WatchDecoder<R> {
    pub fn new(inner: R, scheme: Arc<Scheme>) -> Self {
        Self::with_max_frame_size(inner, scheme, DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(inner: R, scheme: Arc<Scheme>, max_frame_size: u32) -> Self {
        Self {
            reader: FrameReader::with_max_frame_size(inner, max_frame_size),
            codec: EventCodec::new(scheme),
            terminated: false,
        }
    }

    /// Returns the next event on the stream.
    ///
    /// - `Ok(Some(event))`: one decoded event, including `Error`-kind events,
    ///   which are data rather than failures.
    /// - `Ok(None)`: the remote end closed cleanly; the stream is over. The
    ///   signal is stable across further calls.
    /// - `Err(e)` with `e.is_fatal()`: transport failure; the decoder is
    ///   terminated and must be discarded.
    /// - `Err(e)` otherwise: one bad frame; the decoder stays open and the
    ///   next call reads the next frame.
    pub async fn next(&mut self) -> Result<Option<Event>> {
        if self.terminated {
            return Ok(None);
        }

        let frame = match self.reader.read_frame().await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("Watch stream ended cleanly");
                self.terminated = true;
                return Ok(None);
            }
            Err(err) => {
                debug!("Watch stream terminated: {}", err);
                self.terminated = true;
                return Err(err);
            }
        };

        match self.codec.decode_event(&frame) {
            Ok(event) => {
                trace!("Decoded {} event", event.kind());
                Ok(Some(event))
            }
            Err(err) if err.is_fatal() => {
                self.terminated = true;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// True once the stream has ended, cleanly or not.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Caller-initiated close: gives back the underlying reader so the caller
    /// can shut the connection down.
    pub fn close(self) -> R {
        self.reader.into_inner()
    }
}

/// Emits events as an outbound stream. Each call serializes one event and
/// fully flushes one frame; there is no internal buffering.
///
/// `encode` takes `&self`, so an encoder behind an `Arc` can be shared by
/// concurrent producers (an event writer plus a keep-alive writer); the
/// underlying [`FrameWriter`] serializes the actual writes.
pub struct WatchEncoder<W> {
    writer: FrameWriter<W>,
    codec: EventCodec,
}

impl<W: AsyncWrite + Unpin> WatchEncoder<W> {
    pub fn new(inner: W, scheme: Arc<Scheme>) -> Self {
        Self::with_max_frame_size(inner, scheme, DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(inner: W, scheme: Arc<Scheme>, max_frame_size: u32) -> Self {
        Self {
            writer: FrameWriter::with_max_frame_size(inner, max_frame_size),
            codec: EventCodec::new(scheme),
        }
    }

    /// Writes one event as one frame.
    pub async fn encode(&self, event: &Event) -> Result<()> {
        let payload = self.codec.encode_event(event)?;
        self.writer.write_frame(&payload).await
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}
