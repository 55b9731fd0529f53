//! Per-connection byte buffers.
//!
//! Each connection owns two of these: an inbox of bytes read but not yet
//! parsed, and an outbox of reply bytes not yet written. Bytes are appended
//! at the back and consumed from the front, never reordered.

use bytes::{Buf, BytesMut};

/// Growable FIFO byte buffer.
#[derive(Debug, Default)]
pub struct Buffer {
    data: BytesMut,
}

impl Buffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes to the end of the buffer.
    pub fn append(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Remove the first `n` bytes.
    ///
    /// # Panics
    /// Panics if `n` exceeds the number of buffered bytes.
    pub fn consume(&mut self, n: usize) {
        assert!(
            n <= self.data.len(),
            "consume({n}) past end of buffer (len {})",
            self.data.len()
        );
        self.data.advance(n);
    }

    /// Pending bytes, oldest first.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Mutable access for encoders that write in place.
    pub fn as_bytes_mut(&mut self) -> &mut BytesMut {
        &mut self.data
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
