//! Concurrent transfer over every open channel of a running process.

mod error;
mod multiplexer;

pub use error::*;
pub use multiplexer::*;

use crate::engine::RunState;
use crate::handler::HandlerRegistry;
use crate::status::StatusParser;

/// Parse one raw status line and route it to the status subscribers.
///
/// Returns true if the line carried the status prefix.
pub(crate) fn dispatch_status_line(
    line: &[u8],
    registry: &mut HandlerRegistry,
    state: &mut RunState,
) -> bool {
    match StatusParser::parse_line(line) {
        Some(event) => {
            tracing::trace!(%event, "Status event");
            registry.dispatch_status(&event, state);
            true
        }
        None => {
            tracing::trace!(len = line.len(), "Ignoring line without status prefix");
            false
        }
    }
}

/// Route every line of a complete status transcript, e.g. a status file
/// read after the process exited. Returns the number of events delivered.
pub fn dispatch_status_transcript(
    transcript: &[u8],
    registry: &mut HandlerRegistry,
    state: &mut RunState,
) -> usize {
    transcript
        .split(|&b| b == b'\n')
        .filter(|line| dispatch_status_line(line, registry, state))
        .count()
}
