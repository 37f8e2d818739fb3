use bytes::Bytes;

use super::{EOS_MARKER, RECORD_HEADER};

/// Total capacity of one outbound tuple buffer.
pub const CAPACITY: usize = 8192;

/// Encoded size of one outbound value record: fixed header plus LE u32.
pub const OUT_RECORD_LEN: usize = RECORD_HEADER.len() + 4;

/// Cursor position after a reset; bytes `[0..4)` stay reserved for the
/// little-endian total-length header written on finalize.
const DATA_START: usize = 4;

/// Fixed-capacity accumulator for outbound tuple records.
///
/// One instance lives per downstream connection, owned exclusively by the
/// connection's writer task. The buffer is reset immediately whenever its
/// contents are handed off, so it is never observable in a
/// flushed-but-not-reset state.
#[derive(Debug)]
pub struct TupleBuffer {
    buf: Box<[u8; CAPACITY]>,
    pos: usize,
}

impl Default for TupleBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TupleBuffer {
    pub fn new() -> Self {
        Self {
            buf: Box::new([0; CAPACITY]),
            pos: DATA_START,
        }
    }

    /// Append one value record.
    ///
    /// When the record does not fit, the current contents are finalized and
    /// returned for writing, the buffer resets, and the value lands in the
    /// fresh buffer. A value is never dropped.
    pub fn append(&mut self, value: u32) -> Option<Bytes> {
        let flushed = if self.pos + OUT_RECORD_LEN > CAPACITY {
            Some(self.finalize())
        } else {
            None
        };

        self.buf[self.pos..self.pos + RECORD_HEADER.len()].copy_from_slice(&RECORD_HEADER);
        self.pos += RECORD_HEADER.len();
        self.buf[self.pos..self.pos + 4].copy_from_slice(&value.to_le_bytes());
        self.pos += 4;

        flushed
    }

    /// Append the end-of-stream marker and finalize.
    ///
    /// Returns an optional overflow chunk followed by the terminal chunk
    /// carrying the marker. An empty buffer still produces a valid terminal
    /// chunk of header plus marker.
    pub fn append_eos(&mut self) -> (Option<Bytes>, Bytes) {
        let flushed = if self.pos + EOS_MARKER.len() > CAPACITY {
            Some(self.finalize())
        } else {
            None
        };

        self.buf[self.pos..self.pos + EOS_MARKER.len()].copy_from_slice(&EOS_MARKER);
        self.pos += EOS_MARKER.len();

        (flushed, self.finalize())
    }

    /// Write the length header, hand the contents off, and reset.
    fn finalize(&mut self) -> Bytes {
        self.buf[..DATA_START].copy_from_slice(&(self.pos as u32).to_le_bytes());
        let out = Bytes::copy_from_slice(&self.buf[..self.pos]);
        self.pos = DATA_START;
        out
    }
}
