//! Transfer buffers used by the multiplexer.

/// Size of a single read or write on any channel.
pub const CHUNK_SIZE: usize = 8192;

/// Bytes waiting to be written, consumed from the front.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PendingBytes {
    data: Vec<u8>,
    pos: usize,
}

impl PendingBytes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing buffer.
    #[must_use]
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len() - self.pos
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The next chunk to write, at most [`CHUNK_SIZE`] bytes.
    #[must_use]
    pub fn chunk(&self) -> &[u8] {
        let end = self.data.len().min(self.pos + CHUNK_SIZE);
        &self.data[self.pos..end]
    }

    /// Mark `n` bytes from the front as written.
    pub fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.data.len());
        if self.pos == self.data.len() {
            self.data.clear();
            self.pos = 0;
        }
    }

    /// Append bytes at the back.
    pub fn extend(&mut self, bytes: &[u8]) {
        if self.pos > 0 && self.pos == self.data.len() {
            self.data.clear();
            self.pos = 0;
        }
        self.data.extend_from_slice(bytes);
    }

    /// Drop everything still pending. Returns the number of bytes discarded.
    pub fn discard(&mut self) -> usize {
        let dropped = self.len();
        self.data.clear();
        self.pos = 0;
        dropped
    }
}

/// Accumulates raw bytes and yields completed `\n`-terminated lines.
#[derive(Debug, Default, Clone)]
pub struct LineBuffer {
    partial: Vec<u8>,
}

impl LineBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes and return every line they complete, without the `\n`.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut lines = Vec::new();
        let mut rest = bytes;

        while let Some(end) = rest.iter().position(|&b| b == b'\n') {
            let mut line = std::mem::take(&mut self.partial);
            line.extend_from_slice(&rest[..end]);
            lines.push(line);
            rest = &rest[end + 1..];
        }

        self.partial.extend_from_slice(rest);
        lines
    }

    /// Take the unterminated remainder at end-of-stream.
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        if self.partial.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.partial))
        }
    }

    /// Bytes buffered without a terminating newline.
    #[must_use]
    pub fn partial_len(&self) -> usize {
        self.partial.len()
    }
}
