//! Readiness-driven receive loop.
//!
//! One iteration waits for the socket to become readable, drains every byte
//! currently available into the [`ReceiveBuffer`], and splits complete
//! messages out with the configured framing. The only await point is the
//! readiness wait, so dropping [`ReceiveLoop::next_event`] mid-flight loses
//! nothing.

use std::{future::Future, io};

use bytes::Bytes;
use tokio::net::tcp::OwnedReadHalf;
use tracing::{debug, warn};

use super::ClientConfig;
use crate::{
    buffer::ReceiveBuffer,
    framing::FrameCodec,
    metrics::{self, Direction},
};

/// Non-blocking byte source driven by readiness notifications.
pub(crate) trait ReadSource: Send {
    /// Wait until the source may have bytes to read.
    fn readable(&self) -> impl Future<Output = io::Result<()>> + Send;

    /// Read without blocking; `WouldBlock` means nothing is available now.
    fn try_read(&self, buf: &mut [u8]) -> io::Result<usize>;
}

impl ReadSource for OwnedReadHalf {
    fn readable(&self) -> impl Future<Output = io::Result<()>> + Send {
        OwnedReadHalf::readable(self)
    }

    fn try_read(&self, buf: &mut [u8]) -> io::Result<usize> { OwnedReadHalf::try_read(self, buf) }
}

/// Outcome of one readiness iteration.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ReadEvent {
    /// Complete messages decoded in this iteration, possibly none.
    Messages(Vec<String>),
    /// The peer closed the stream; carries the messages flushed on close.
    Closed(Vec<String>),
}

/// Receive side of one relay connection.
pub(crate) struct ReceiveLoop<R> {
    source: R,
    buffer: ReceiveBuffer,
    codec: FrameCodec,
    chunk: Box<[u8]>,
}

impl<R: ReadSource> ReceiveLoop<R> {
    pub(crate) fn new(source: R, config: &ClientConfig) -> Self {
        Self {
            source,
            buffer: ReceiveBuffer::with_capacity(config.initial_buffer_capacity()),
            codec: config.framing_value().codec(config.max_frame_length_value()),
            chunk: vec![0; config.read_chunk_value()].into_boxed_slice(),
        }
    }

    /// Run one readiness iteration.
    ///
    /// # Errors
    ///
    /// Returns the I/O error of a failed read. The iteration is abandoned;
    /// calling again continues with the next one. A failed readiness wait is
    /// not retried and ends the stream as [`ReadEvent::Closed`].
    pub(crate) async fn next_event(&mut self) -> io::Result<ReadEvent> {
        if let Err(error) = self.source.readable().await {
            metrics::inc_errors();
            warn!(%error, "readiness wait failed, treating as disconnect");
            return Ok(ReadEvent::Closed(Vec::new()));
        }
        self.codec.begin_burst(&mut self.buffer);

        let mut closed = false;
        loop {
            match self.source.try_read(&mut self.chunk) {
                Ok(0) => {
                    closed = true;
                    break;
                }
                Ok(n) => self.buffer.append(&self.chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if is_disconnect(&e) => {
                    debug!(error = %e, "read reported disconnect");
                    closed = true;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        let mut frames = Vec::new();
        if closed {
            match self.codec.decode_eof(&mut self.buffer, &mut frames) {
                Ok(0) => {}
                Ok(dropped) => warn!(dropped, "discarding partial frame at end of stream"),
                Err(error) => {
                    metrics::inc_errors();
                    warn!(%error, "framing error at end of stream");
                }
            }
            return Ok(ReadEvent::Closed(decode_text(frames)));
        }
        if let Err(error) = self.codec.decode_available(&mut self.buffer, &mut frames) {
            metrics::inc_errors();
            warn!(%error, "framing error, dropping malformed input");
        }
        Ok(ReadEvent::Messages(decode_text(frames)))
    }
}

fn is_disconnect(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
    )
}

/// Convert frames to text, dropping any that are not valid UTF-8.
fn decode_text(frames: Vec<Bytes>) -> Vec<String> {
    frames
        .into_iter()
        .filter_map(|frame| {
            metrics::inc_frames(Direction::Inbound);
            match String::from_utf8(frame.to_vec()) {
                Ok(text) => Some(text),
                Err(error) => {
                    metrics::inc_errors();
                    warn!(len = frame.len(), %error, "dropping message that is not valid UTF-8");
                    None
                }
            }
        })
        .collect()
}
