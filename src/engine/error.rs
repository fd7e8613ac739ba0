//! Engine errors.

use std::time::Duration;

use crate::channel::ChannelRole;
use crate::multiplex::MultiplexError;
use crate::process::ProcessSpawnError;

use super::state::EnginePhase;

/// Infrastructure failures of an engine run.
///
/// Protocol-level failures are never reported here; they are accumulated
/// into the run's [`ErrorKind`](crate::classify::ErrorKind).
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("Failed to spawn gpg: {0}")]
    Spawn(#[from] ProcessSpawnError),
    #[error("Channel transfer failed: {0}")]
    Multiplex(#[from] MultiplexError),
    /// The run deadline expired. The process was terminated and reaped.
    #[error("gpg did not finish within {0:?}")]
    Timeout(Duration),
    #[error("No runnable operation (engine is {phase:?})")]
    InvalidOperation { phase: EnginePhase },
    #[error("The {0} channel cannot be bound by callers")]
    InvalidBinding(ChannelRole),
    #[error("Failed to reap gpg process: {0}")]
    Wait(#[source] std::io::Error),
    #[error("Failed to read status file: {0}")]
    StatusFile(#[source] std::io::Error),
    #[error("Unrecognized gpg version output")]
    UnknownVersion,
}
