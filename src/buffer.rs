//! Growable receive buffer.
//!
//! Inbound bytes accumulate here between readiness wake-ups. Capacity starts
//! small and doubles whenever the next chunk would not fit, so a burst larger
//! than the initial capacity is kept intact and in order.

use bytes::BytesMut;
use log::debug;

/// Initial capacity of a [`ReceiveBuffer`], matching the read chunk size.
pub const INITIAL_RECEIVE_CAPACITY: usize = 512;

/// Byte accumulator owned by the receive loop.
#[derive(Debug)]
pub struct ReceiveBuffer {
    bytes: BytesMut,
    capacity: usize,
}

impl Default for ReceiveBuffer {
    fn default() -> Self { Self::with_capacity(INITIAL_RECEIVE_CAPACITY) }
}

impl ReceiveBuffer {
    /// Create a buffer with the given initial capacity (at least one byte).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            bytes: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a chunk, doubling the capacity until it fits.
    pub fn append(&mut self, chunk: &[u8]) {
        let needed = self.bytes.len() + chunk.len();
        if needed > self.capacity {
            let mut grown = self.capacity;
            while grown < needed {
                grown *= 2;
            }
            debug!(
                "doubling receive buffer: from={}, to={}, needed={needed}",
                self.capacity, grown
            );
            self.bytes.reserve(grown - self.bytes.len());
            self.capacity = grown;
        }
        self.bytes.extend_from_slice(chunk);
    }

    /// Drop all buffered bytes. Capacity is kept.
    pub fn clear(&mut self) { self.bytes.clear(); }

    #[must_use]
    pub fn len(&self) -> usize { self.bytes.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.bytes.is_empty() }

    /// Logical capacity after any doubling.
    #[must_use]
    pub const fn capacity(&self) -> usize { self.capacity }

    /// Readable view of the buffered bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] { &self.bytes }

    /// Mutable access for frame decoders that split consumed bytes off.
    pub fn bytes_mut(&mut self) -> &mut BytesMut { &mut self.bytes }
}
