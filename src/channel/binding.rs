//! Caller-side sources and sinks bound to channel roles.

use tokio::io::{AsyncRead, AsyncWrite};

/// Boxed byte reader used for process pipes and caller streams.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Boxed byte writer used for process pipes and caller streams.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Data fed to an input role.
pub enum Source {
    /// Entire input held in memory.
    Buffer(Vec<u8>),
    /// Input read incrementally until end-of-stream.
    Stream(BoxedReader),
}

impl Source {
    /// Wrap any async reader as a stream source.
    pub fn stream<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self::Stream(Box::new(reader))
    }
}

impl From<Vec<u8>> for Source {
    fn from(data: Vec<u8>) -> Self {
        Self::Buffer(data)
    }
}

impl From<&[u8]> for Source {
    fn from(data: &[u8]) -> Self {
        Self::Buffer(data.to_vec())
    }
}

impl From<&str> for Source {
    fn from(data: &str) -> Self {
        Self::Buffer(data.as_bytes().to_vec())
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buffer(data) => f.debug_tuple("Buffer").field(&data.len()).finish(),
            Self::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// Destination of the primary output role.
#[derive(Default)]
pub enum Sink {
    /// Collect output in memory; read it back from the engine after the run.
    #[default]
    Buffer,
    /// Write output incrementally to a caller stream.
    Stream(BoxedWriter),
}

impl Sink {
    /// Wrap any async writer as a stream sink.
    pub fn stream<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::Stream(Box::new(writer))
    }
}

impl std::fmt::Debug for Sink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buffer => f.write_str("Buffer"),
            Self::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// Caller bindings for one run.
#[derive(Debug, Default)]
pub struct ChannelSet {
    pub primary_input: Option<Source>,
    pub message_input: Option<Source>,
    pub primary_output: Sink,
}

impl ChannelSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if a message input is bound.
    #[must_use]
    pub fn has_message_input(&self) -> bool {
        self.message_input.is_some()
    }
}
