//! Engine facade driving one GnuPG run at a time.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::channel::{ChannelRole, ChannelSet, Sink, Source};
use crate::classify::{ErrorClassifier, ErrorKind};
use crate::config::{ConfigError, ConfigLoader, EngineConfig};
use crate::handler::{DebugEcho, ErrorLineHandler, HandlerRegistry, StatusHandler};
use crate::multiplex::{dispatch_status_transcript, ChannelMultiplexer, DEFAULT_KILL_GRACE};
use crate::operation::Operation;
use crate::process::{ChannelBackend, GpgArgsBuilder, GpgProcess, GpgVersion, SpawnRequest};

use super::error::EngineError;
use super::state::{EnginePhase, RunState};

/// Runs GnuPG operations and classifies their outcome.
///
/// ```no_run
/// # async fn demo() -> Result<(), gpg_engine::engine::EngineError> {
/// use gpg_engine::channel::{ChannelRole, Source};
/// use gpg_engine::engine::Engine;
/// use gpg_engine::passphrase::PassphraseCoordinator;
///
/// let mut engine = Engine::default();
/// engine.set_operation("--decrypt", Vec::<String>::new())?;
/// engine.bind_input(ChannelRole::PrimaryInput, Source::from("-----BEGIN PGP MESSAGE-----"))?;
/// engine.register_status_handler(PassphraseCoordinator::for_key("ABCD1234", Some("secret")));
/// engine.run().await?;
/// println!("{} -> {:?}", engine.error_kind(), engine.exit_code());
/// # Ok(())
/// # }
/// ```
pub struct Engine {
    config: EngineConfig,
    phase: EnginePhase,
    operation: Option<Operation>,
    channels: ChannelSet,
    registry: HandlerRegistry,
    state: RunState,
    timeout: Option<Duration>,
    cancel: Option<CancellationToken>,
    kill_grace: Duration,
    exit_code: Option<i32>,
    output: Vec<u8>,
}

impl Engine {
    /// Create an idle engine with the built-in subscribers installed.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let timeout = config.timeout();
        let mut engine = Self {
            config,
            phase: EnginePhase::Idle,
            operation: None,
            channels: ChannelSet::new(),
            registry: HandlerRegistry::new(),
            state: RunState::new(),
            timeout,
            cancel: None,
            kill_grace: DEFAULT_KILL_GRACE,
            exit_code: None,
            output: Vec::new(),
        };
        engine.reset();
        engine
    }

    /// Create an engine from the first configuration file found.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a config file exists but cannot be loaded.
    pub fn from_default_config() -> Result<Self, ConfigError> {
        Ok(Self::new(ConfigLoader::new().load()?))
    }

    /// Discard the operation, bindings, subscribers and per-run state, then
    /// re-install the built-in subscribers.
    ///
    /// The engine returns to `Idle`, not `Configured`: the operation is
    /// cleared too, so [`set_operation`](Self::set_operation) must be called
    /// before the next run. Resetting twice is the same as a fresh engine.
    /// Timeout and cancellation settings are kept.
    pub fn reset(&mut self) {
        self.phase = EnginePhase::Idle;
        self.operation = None;
        self.channels = ChannelSet::new();
        self.state = RunState::new();
        self.exit_code = None;
        self.output.clear();

        self.registry.clear();
        self.registry.register_status(Box::new(ErrorClassifier));
        self.registry.register_error(Box::new(ErrorClassifier));
        if self.config.debug {
            self.registry.register_status(Box::new(DebugEcho));
            self.registry.register_error(Box::new(DebugEcho));
        }
    }

    /// Set the command and arguments for the next run.
    ///
    /// Use [`MESSAGE_INPUT_PLACEHOLDER`](crate::operation::MESSAGE_INPUT_PLACEHOLDER)
    /// as an argument where the message input should be referenced.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidOperation` after a run has completed;
    /// call [`reset`](Self::reset) first.
    pub fn set_operation<I, S>(
        &mut self,
        command: impl Into<String>,
        args: I,
    ) -> Result<(), EngineError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match self.phase {
            EnginePhase::Idle | EnginePhase::Configured => {
                self.operation = Some(Operation::new(command, args));
                self.phase = EnginePhase::Configured;
                Ok(())
            }
            phase => Err(EngineError::InvalidOperation { phase }),
        }
    }

    /// Bind a caller source to an input role.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidBinding` unless `role` is
    /// [`ChannelRole::PrimaryInput`] or [`ChannelRole::MessageInput`].
    pub fn bind_input(&mut self, role: ChannelRole, source: Source) -> Result<(), EngineError> {
        if !(role.is_caller_bindable() && role.is_input()) {
            return Err(EngineError::InvalidBinding(role));
        }
        if role == ChannelRole::MessageInput {
            self.channels.message_input = Some(source);
        } else {
            self.channels.primary_input = Some(source);
        }
        Ok(())
    }

    /// Bind a caller sink to an output role.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidBinding` unless `role` is
    /// [`ChannelRole::PrimaryOutput`].
    pub fn bind_output(&mut self, role: ChannelRole, sink: Sink) -> Result<(), EngineError> {
        if !role.is_caller_bindable() || role.is_input() {
            return Err(EngineError::InvalidBinding(role));
        }
        self.channels.primary_output = sink;
        Ok(())
    }

    /// Append a subscriber for status events, after the built-ins.
    pub fn register_status_handler(&mut self, handler: impl StatusHandler + 'static) {
        self.registry.register_status(Box::new(handler));
    }

    /// Append a subscriber for stderr lines, after the built-ins.
    pub fn register_error_handler(&mut self, handler: impl ErrorLineHandler + 'static) {
        self.registry.register_error(Box::new(handler));
    }

    /// Queue a line for the command channel. A newline is appended.
    ///
    /// Lines queued before [`run`](Self::run) are delivered as soon as the
    /// process starts.
    pub fn send_command(&mut self, text: &str) {
        self.state.send_command(text);
    }

    /// Terminate runs when `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Override the configured run deadline. `None` disables it.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// Time between terminate and kill, and between kill and abandoning the
    /// channels.
    pub fn set_kill_grace(&mut self, grace: Duration) {
        self.kill_grace = grace;
    }

    /// Run the configured operation to completion.
    ///
    /// Protocol failures do not make this return an error; inspect
    /// [`error_kind`](Self::error_kind) and [`exit_code`](Self::exit_code).
    /// A cancelled run completes normally with whatever was classified.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidOperation` unless the engine is
    /// configured, `EngineError::Spawn` or `EngineError::Multiplex` for
    /// infrastructure failures, and `EngineError::Timeout` if the deadline
    /// expired. Exit code and classification are still recorded on timeout.
    pub async fn run(&mut self) -> Result<(), EngineError> {
        let operation = match (self.phase, &self.operation) {
            (EnginePhase::Configured, Some(operation)) => operation.clone(),
            (phase, _) => return Err(EngineError::InvalidOperation { phase }),
        };

        self.phase = EnginePhase::Running;
        let result = self.execute(operation).await;
        self.phase = EnginePhase::Completed;

        if let Err(e) = &result {
            tracing::warn!(error = %e, "gpg run failed");
        }
        result
    }

    async fn execute(&mut self, operation: Operation) -> Result<(), EngineError> {
        let backend = self.config.backend().supported();
        let preloaded_commands = match backend {
            ChannelBackend::Files => self.state.take_commands(),
            ChannelBackend::Pipes => Vec::new(),
        };
        let request = SpawnRequest {
            binary: self.config.binary.clone(),
            global_args: GpgArgsBuilder::from_config(&self.config).build_args(),
            operation,
            backend,
            preloaded_commands,
        };

        let mut channels = std::mem::take(&mut self.channels);
        let (mut process, pipes) = GpgProcess::spawn(&request, &mut channels).await?;

        let multiplexed = ChannelMultiplexer::new(pipes, channels)
            .with_timeout(self.timeout)
            .with_cancellation(self.cancel.clone())
            .with_kill_grace(self.kill_grace)
            .run(&mut self.registry, &mut self.state, &mut process)
            .await;

        let report = match multiplexed {
            Ok(report) => report,
            Err(e) => {
                if let Err(wait_err) = process.wait().await {
                    tracing::debug!(error = %wait_err, "Failed to reap gpg after transfer failure");
                }
                return Err(e.into());
            }
        };

        let exit_code = process.wait().await.map_err(EngineError::Wait)?;

        if let Some(transcript) = process
            .read_status_file()
            .await
            .map_err(EngineError::StatusFile)?
        {
            let events = dispatch_status_transcript(&transcript, &mut self.registry, &mut self.state);
            let late = self.state.take_commands();
            if !late.is_empty() {
                tracing::warn!(
                    bytes = late.len(),
                    "Commands produced from a status file cannot reach gpg"
                );
            }
            tracing::debug!(events, "Dispatched status file");
        }

        self.state.finalize(exit_code);
        self.exit_code = Some(exit_code);
        self.output = report.output;

        tracing::info!(
            exit_code,
            error_kind = %self.state.error_kind(),
            cancelled = report.cancelled,
            "gpg run completed"
        );

        if report.timed_out {
            return Err(EngineError::Timeout(self.timeout.unwrap_or_default()));
        }
        Ok(())
    }

    /// Run `gpg --version` with this engine's configuration and parse it.
    ///
    /// # Errors
    ///
    /// Returns any run error, or `EngineError::UnknownVersion` if the output
    /// is not recognized.
    pub async fn detect_version(&self) -> Result<GpgVersion, EngineError> {
        let mut version_run = Self::new(self.config.clone());
        version_run.set_timeout(self.timeout);
        version_run.set_operation("--version", Vec::<String>::new())?;
        version_run.run().await?;

        let text = String::from_utf8_lossy(version_run.output());
        let version = GpgVersion::parse(&text).ok_or(EngineError::UnknownVersion)?;
        tracing::debug!(%version, "Detected gpg version");
        Ok(version)
    }

    /// Classification of the last run, or of the run in progress.
    #[must_use]
    pub fn error_kind(&self) -> ErrorKind {
        self.state.error_kind()
    }

    /// Exit code of the last completed run.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// True for a zero exit with no error, or only a duplicate key.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
            && matches!(self.error_kind(), ErrorKind::None | ErrorKind::DuplicateKey)
    }

    /// Primary output collected in memory by the last run.
    #[must_use]
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    #[must_use]
    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    #[must_use]
    pub fn run_state(&self) -> &RunState {
        &self.state
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn operation(&self) -> Option<&Operation> {
        self.operation.as_ref()
    }

    #[must_use]
    pub fn status_handler_count(&self) -> usize {
        self.registry.status_count()
    }

    #[must_use]
    pub fn error_handler_count(&self) -> usize {
        self.registry.error_count()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("phase", &self.phase)
            .field("operation", &self.operation)
            .field("registry", &self.registry)
            .field("error_kind", &self.state.error_kind())
            .field("exit_code", &self.exit_code)
            .finish_non_exhaustive()
    }
}
