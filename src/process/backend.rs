//! Selection between pipe-backed and file-backed extra channels.

use serde::{Deserialize, Serialize};

/// How the status, command and message channels reach the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelBackend {
    /// Extra inherited pipe descriptors (`--status-fd`, `--command-fd`, `-&N`).
    Pipes,
    /// Temporary files (`--status-file`, `--command-file`, a message path).
    ///
    /// Status lines are only seen after the process exits and commands must
    /// be queued before the run starts.
    Files,
}

impl ChannelBackend {
    /// The best backend this platform supports.
    #[must_use]
    pub fn detect() -> Self {
        if cfg!(unix) {
            Self::Pipes
        } else {
            Self::Files
        }
    }

    /// Resolve a requested backend against platform support.
    #[must_use]
    pub fn supported(self) -> Self {
        match self {
            Self::Pipes if !cfg!(unix) => {
                tracing::warn!("Pipe channels unsupported on this platform, using files");
                Self::Files
            }
            other => other,
        }
    }
}
