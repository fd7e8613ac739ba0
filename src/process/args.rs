//! Global GnuPG argument construction.

use std::path::PathBuf;

use crate::config::EngineConfig;

/// Flags passed on every invocation, before channel and operation arguments.
pub const SAFETY_FLAGS: [&str; 4] = [
    "--no-tty",
    "--no-secmem-warning",
    "--no-permission-warning",
    "--exit-on-status-write-error",
];

/// Builder for the global part of a GnuPG command line.
#[derive(Debug, Clone)]
pub struct GpgArgsBuilder {
    homedir: Option<PathBuf>,
    trust_model: String,
    pinentry_loopback: bool,
    extra_args: Vec<String>,
}

impl Default for GpgArgsBuilder {
    fn default() -> Self {
        Self {
            homedir: None,
            trust_model: "always".to_string(),
            pinentry_loopback: true,
            extra_args: Vec::new(),
        }
    }
}

impl GpgArgsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every global setting from an engine configuration.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            homedir: config.homedir.clone(),
            trust_model: config.trust_model.clone(),
            pinentry_loopback: config.pinentry_loopback,
            extra_args: config.extra_args.clone(),
        }
    }

    /// Use a keyring directory other than the default.
    #[must_use]
    pub fn homedir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.homedir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn trust_model(mut self, model: impl Into<String>) -> Self {
        self.trust_model = model.into();
        self
    }

    #[must_use]
    pub fn pinentry_loopback(mut self, enabled: bool) -> Self {
        self.pinentry_loopback = enabled;
        self
    }

    /// Append extra global arguments.
    #[must_use]
    pub fn extra_args(mut self, args: &[&str]) -> Self {
        self.extra_args.extend(args.iter().map(|s| (*s).to_string()));
        self
    }

    /// Get the home directory, if set.
    #[must_use]
    pub fn get_homedir(&self) -> Option<&PathBuf> {
        self.homedir.as_ref()
    }

    /// Build the global command-line arguments.
    #[must_use]
    pub fn build_args(&self) -> Vec<String> {
        let mut args: Vec<String> = SAFETY_FLAGS.iter().map(|s| (*s).to_string()).collect();

        args.push("--trust-model".to_string());
        args.push(self.trust_model.clone());

        if self.pinentry_loopback {
            args.push("--pinentry-mode".to_string());
            args.push("loopback".to_string());
        }

        if let Some(dir) = &self.homedir {
            args.push("--homedir".to_string());
            args.push(dir.display().to_string());
        }

        args.extend(self.extra_args.iter().cloned());
        args
    }
}
