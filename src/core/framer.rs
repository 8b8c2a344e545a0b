//! Byte-to-line framing for the modem stream
//!
//! Bytes accumulate until a `\n` arrives; the buffer is then trimmed and
//! emitted as one line. Empty lines are emitted too and left to the session
//! to ignore.

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

const LINE_TERMINATOR: u8 = b'\n';

/// Accumulates bytes into lines
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: Vec<u8>,
    // Bytes of the line in progress, `\r` excluded
    content_len: usize,
    max_len: Option<usize>,
    discarding: bool,
    overflows: u64,
}

impl LineFramer {
    /// Create an unbounded framer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a framer that discards lines longer than `max_len` bytes.
    ///
    /// Carriage returns do not count toward the bound.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            max_len: Some(max_len),
            ..Self::default()
        }
    }

    /// Configured line bound, if any
    pub fn max_len(&self) -> Option<usize> {
        self.max_len
    }

    /// Number of lines discarded for exceeding the bound
    pub fn overflows(&self) -> u64 {
        self.overflows
    }

    /// Bytes buffered for the line in progress
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Feed one byte, returning a line when it completes one
    pub fn feed(&mut self, byte: u8) -> Option<String> {
        if byte == LINE_TERMINATOR {
            self.content_len = 0;
            if std::mem::take(&mut self.discarding) {
                return None;
            }
            let raw = std::mem::take(&mut self.buffer);
            return Some(String::from_utf8_lossy(&raw).trim().to_string());
        }

        if self.discarding {
            return None;
        }

        if byte == b'\r' {
            self.buffer.push(byte);
            return None;
        }

        if let Some(max) = self.max_len {
            if self.content_len >= max {
                self.overflows += 1;
                self.discarding = true;
                tracing::warn!(
                    max_len = max,
                    "Discarding line longer than {} bytes: {:?}...",
                    max,
                    String::from_utf8_lossy(&self.buffer[..max.min(32)])
                );
                self.buffer.clear();
                self.content_len = 0;
                return None;
            }
        }

        self.content_len += 1;
        self.buffer.push(byte);
        None
    }

    /// Feed a chunk, collecting every completed line in order
    pub fn feed_bytes(&mut self, data: &[u8]) -> Vec<String> {
        data.iter().filter_map(|&b| self.feed(b)).collect()
    }
}

impl Decoder for LineFramer {
    type Item = String;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        while src.has_remaining() {
            if let Some(line) = self.feed(src.get_u8()) {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }
}
