//! Multiplexer errors.

use crate::channel::ChannelRole;

/// Failure while moving bytes between the caller and the process.
#[derive(thiserror::Error, Debug)]
pub enum MultiplexError {
    /// Reading or writing a process pipe failed.
    #[error("I/O error on {role} channel: {source}")]
    Channel {
        role: ChannelRole,
        source: std::io::Error,
    },
    /// Reading a caller-supplied input stream failed.
    #[error("Failed to read caller input for {role}: {source}")]
    Source {
        role: ChannelRole,
        source: std::io::Error,
    },
    /// Writing to the caller's output stream failed.
    #[error("Failed to write primary output: {0}")]
    Sink(#[source] std::io::Error),
}

impl MultiplexError {
    /// The channel involved, if the failure is tied to one.
    #[must_use]
    pub fn role(&self) -> ChannelRole {
        match self {
            Self::Channel { role, .. } | Self::Source { role, .. } => *role,
            Self::Sink(_) => ChannelRole::PrimaryOutput,
        }
    }
}
