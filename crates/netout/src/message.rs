//! Fixed-capacity outbound message buffer
//!
//! One [`OutboundMessage`] holds the bytes of a single not-yet-transmitted
//! network message. Its storage is inline and exactly
//! [`MESSAGE_BUFFER_CAPACITY`](crate::config::MESSAGE_BUFFER_CAPACITY)
//! bytes, so every message occupies an identically sized block and the
//! recycling free list can treat all of them interchangeably.
//!
//! Byte-level protocol encoding lives with the connection's protocol
//! implementation; this type only offers raw appends.

use std::fmt;

use crate::config::MESSAGE_BUFFER_CAPACITY;
use crate::error::{PoolError, Result};

/// A single outbound network message being accumulated before transmission
pub struct OutboundMessage {
    len: usize,
    buf: [u8; MESSAGE_BUFFER_CAPACITY],
}

impl OutboundMessage {
    /// Create an empty message.
    ///
    /// Construction happens through the message pool; connections obtain
    /// buffers via [`MessagePool::acquire`](crate::MessagePool::acquire).
    pub(crate) fn new() -> Self {
        Self { len: 0, buf: [0; MESSAGE_BUFFER_CAPACITY] }
    }

    /// Append a single byte
    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.write_bytes(&[byte])
    }

    /// Append a slice of bytes
    ///
    /// Fails with [`PoolError::BufferFull`] and leaves the buffer unchanged
    /// when the write does not fit.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let remaining = self.remaining();
        if bytes.len() > remaining {
            return Err(PoolError::buffer_full(bytes.len(), remaining, MESSAGE_BUFFER_CAPACITY));
        }
        self.buf[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
        Ok(())
    }

    /// Number of bytes written so far
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no bytes have been written
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes still unused
    pub fn remaining(&self) -> usize {
        MESSAGE_BUFFER_CAPACITY - self.len
    }

    /// Total capacity in bytes
    pub fn capacity(&self) -> usize {
        MESSAGE_BUFFER_CAPACITY
    }

    /// The written bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Discard all written bytes, keeping the storage
    pub fn clear(&mut self) {
        self.len = 0;
    }
}

impl fmt::Debug for OutboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutboundMessage")
            .field("len", &self.len)
            .field("capacity", &MESSAGE_BUFFER_CAPACITY)
            .finish()
    }
}
