//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::process::ChannelBackend;

/// Configuration for an [`Engine`](crate::engine::Engine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Path or name of the GnuPG executable.
    pub binary: PathBuf,
    /// Keyring directory passed as `--homedir`.
    pub homedir: Option<PathBuf>,
    /// Deadline for a single run, in seconds.
    pub timeout_secs: Option<u64>,
    /// Echo every status and stderr line into the debug log.
    pub debug: bool,
    /// Force pipes or temporary files for the extra channels. Detected when unset.
    pub channel_backend: Option<ChannelBackend>,
    /// Value for `--trust-model`.
    pub trust_model: String,
    /// Pass `--pinentry-mode loopback` so passphrases come from the command channel.
    pub pinentry_loopback: bool,
    /// Extra global arguments placed before the operation.
    pub extra_args: Vec<String>,
}

fn default_binary() -> PathBuf {
    PathBuf::from("gpg")
}

fn default_trust_model() -> String {
    "always".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            homedir: None,
            timeout_secs: None,
            debug: false,
            channel_backend: None,
            trust_model: default_trust_model(),
            pinentry_loopback: true,
            extra_args: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Run deadline, if configured.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Channel backend to use, detecting the platform default when unset.
    #[must_use]
    pub fn backend(&self) -> ChannelBackend {
        self.channel_backend.unwrap_or_else(ChannelBackend::detect)
    }
}
