//! Single-task readiness loop over every channel of one GnuPG run.
//!
//! Inputs are written and outputs drained concurrently, in chunks of at most
//! [`CHUNK_SIZE`] bytes, so a process that blocks writing one channel while
//! waiting on another never deadlocks the run. Status and stderr lines are
//! dispatched to subscribers as soon as they are complete, and any command
//! text they queue is written back before the next readiness wait.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::channel::{
    BoxedReader, BoxedWriter, ChannelRole, ChannelSet, LineBuffer, PendingBytes, Sink, Source,
    CHUNK_SIZE,
};
use crate::engine::RunState;
use crate::handler::HandlerRegistry;
use crate::process::{ProcessControl, ProcessPipes};
use crate::status::trim_line_end;

use super::dispatch_status_line;
use super::error::MultiplexError;

/// Time between asking the process to stop and killing it, and between
/// killing it and giving up on its channels.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(5);

/// Outcome of one multiplexed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiplexReport {
    /// Primary output collected in memory. Empty when a stream sink was bound.
    pub output: Vec<u8>,
    /// Total bytes read from the primary output channel.
    pub output_bytes: usize,
    /// Status events delivered to subscribers.
    pub status_events: usize,
    /// Stderr lines delivered to subscribers.
    pub error_lines: usize,
    /// The run deadline expired.
    pub timed_out: bool,
    /// The run was cancelled by the caller.
    pub cancelled: bool,
}

/// Drives every open channel of one process until its outputs are exhausted.
pub struct ChannelMultiplexer {
    primary_input: Outbound,
    message_input: Outbound,
    command_input: Outbound,
    primary_output: Inbound,
    error_output: Inbound,
    status_output: Inbound,
    sink: OutputSink,
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
    kill_grace: Duration,
}

impl ChannelMultiplexer {
    /// Pair the process pipes with the caller bindings.
    ///
    /// An input pipe with no caller source is closed before the first wait,
    /// so the process sees end-of-input immediately.
    #[must_use]
    pub fn new(pipes: ProcessPipes, channels: ChannelSet) -> Self {
        let ProcessPipes {
            stdin,
            stdout,
            stderr,
            status,
            command,
            message,
        } = pipes;
        let ChannelSet {
            primary_input,
            message_input,
            primary_output,
        } = channels;

        Self {
            primary_input: Outbound::new(ChannelRole::PrimaryInput, stdin, primary_input, false),
            message_input: Outbound::new(ChannelRole::MessageInput, message, message_input, false),
            command_input: Outbound::new(ChannelRole::CommandInput, command, None, true),
            primary_output: Inbound::new(ChannelRole::PrimaryOutput, stdout),
            error_output: Inbound::new(ChannelRole::ErrorOutput, stderr),
            status_output: Inbound::new(ChannelRole::StatusOutput, status),
            sink: OutputSink::from(primary_output),
            deadline: None,
            cancel: None,
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }

    /// Terminate the process when `timeout` elapses.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.deadline = timeout.map(|t| Instant::now() + t);
        self
    }

    /// Terminate the process when `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: Option<CancellationToken>) -> Self {
        self.cancel = token;
        self
    }

    #[must_use]
    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    /// Run until the primary output, stderr and status channels all reach
    /// end-of-stream.
    ///
    /// On failure the process is killed before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns `MultiplexError` if a channel, a caller source or the caller
    /// sink fails. A process that stops reading an input is not an error;
    /// that input is abandoned.
    pub async fn run(
        self,
        registry: &mut HandlerRegistry,
        state: &mut RunState,
        control: &mut (dyn ProcessControl + Send),
    ) -> Result<MultiplexReport, MultiplexError> {
        let result = self.drive(registry, state, control).await;
        if let Err(e) = &result {
            tracing::error!(error = %e, role = %e.role(), "Channel transfer failed, killing gpg");
            control.kill();
        }
        result
    }

    async fn drive(
        self,
        registry: &mut HandlerRegistry,
        state: &mut RunState,
        control: &mut (dyn ProcessControl + Send),
    ) -> Result<MultiplexReport, MultiplexError> {
        let Self {
            mut primary_input,
            mut message_input,
            mut command_input,
            mut primary_output,
            mut error_output,
            mut status_output,
            mut sink,
            deadline,
            mut cancel,
            kill_grace,
        } = self;

        let mut report = MultiplexReport::default();
        let mut interrupt = deadline.map(|at| Interrupt {
            at,
            next: Escalation::Terminate,
        });

        loop {
            route_commands(state, &mut command_input);
            primary_input.close_if_drained();
            message_input.close_if_drained();
            command_input.close_if_drained();

            if !primary_output.is_open() && !error_output.is_open() && !status_output.is_open() {
                break;
            }

            let accept_output = sink.has_capacity();

            tokio::select! {
                () = wait_cancelled(cancel.as_ref()) => {
                    tracing::info!("Run cancelled, terminating gpg");
                    report.cancelled = true;
                    cancel = None;
                    control.terminate();
                    interrupt = Some(Interrupt::after(kill_grace, Escalation::Kill));
                }
                () = wait_until(interrupt.as_ref().map(|i| i.at)) => {
                    let Some(current) = interrupt.take() else {
                        continue;
                    };
                    match current.next {
                        Escalation::Terminate => {
                            tracing::warn!("Run deadline reached, terminating gpg");
                            report.timed_out = true;
                            control.terminate();
                            interrupt = Some(Interrupt::after(kill_grace, Escalation::Kill));
                        }
                        Escalation::Kill => {
                            tracing::warn!("gpg still running after terminate, killing");
                            control.kill();
                            interrupt = Some(Interrupt::after(kill_grace, Escalation::Abandon));
                        }
                        Escalation::Abandon => {
                            tracing::warn!("Channels still open after kill, abandoning them");
                            break;
                        }
                    }
                }
                read = status_output.read() => match read {
                    Ok(0) => {
                        if let Some(line) = status_output.close() {
                            report.status_events +=
                                usize::from(dispatch_status_line(&line, registry, state));
                        }
                    }
                    Ok(n) => {
                        for line in status_output.lines(n) {
                            report.status_events +=
                                usize::from(dispatch_status_line(&line, registry, state));
                        }
                    }
                    Err(e) => return Err(status_output.failed(e)),
                },
                read = error_output.read() => match read {
                    Ok(0) => {
                        if let Some(line) = error_output.close() {
                            dispatch_error_line(&line, registry, state);
                            report.error_lines += 1;
                        }
                    }
                    Ok(n) => {
                        for line in error_output.lines(n) {
                            dispatch_error_line(&line, registry, state);
                            report.error_lines += 1;
                        }
                    }
                    Err(e) => return Err(error_output.failed(e)),
                },
                read = primary_output.read(), if accept_output => match read {
                    Ok(0) => {
                        primary_output.close();
                    }
                    Ok(n) => {
                        report.output_bytes += n;
                        sink.accept(primary_output.filled(n));
                    }
                    Err(e) => return Err(primary_output.failed(e)),
                },
                written = sink.write_some() => written.map_err(MultiplexError::Sink)?,
                step = command_input.step() => command_input.settle(step)?,
                step = primary_input.step() => primary_input.settle(step)?,
                step = message_input.step() => message_input.settle(step)?,
            }
        }

        for channel in [&mut primary_input, &mut message_input, &mut command_input] {
            channel.abandon_remaining();
        }

        report.output = sink.finish().await.map_err(MultiplexError::Sink)?;
        tracing::debug!(
            output_bytes = report.output_bytes,
            status_events = report.status_events,
            error_lines = report.error_lines,
            "Channels drained"
        );
        Ok(report)
    }
}

impl std::fmt::Debug for ChannelMultiplexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelMultiplexer")
            .field("deadline", &self.deadline)
            .field("cancellable", &self.cancel.is_some())
            .field("kill_grace", &self.kill_grace)
            .finish_non_exhaustive()
    }
}

/// Move commands queued by subscribers onto the command channel.
fn route_commands(state: &mut RunState, command_input: &mut Outbound) {
    let commands = state.take_commands();
    if commands.is_empty() {
        return;
    }
    if !command_input.queue(&commands) {
        tracing::warn!(
            bytes = commands.len(),
            "Command channel not open, dropping queued commands"
        );
    }
}

fn dispatch_error_line(line: &[u8], registry: &mut HandlerRegistry, state: &mut RunState) {
    let line = String::from_utf8_lossy(trim_line_end(line));
    tracing::trace!(%line, "gpg stderr");
    registry.dispatch_error(&line, state);
}

async fn wait_until(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn wait_cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Escalation {
    Terminate,
    Kill,
    Abandon,
}

#[derive(Debug, Clone, Copy)]
struct Interrupt {
    at: Instant,
    next: Escalation,
}

impl Interrupt {
    fn after(delay: Duration, next: Escalation) -> Self {
        Self {
            at: Instant::now() + delay,
            next,
        }
    }
}

/// Result of one readiness step on an input channel.
enum OutboundStep {
    Filled,
    SourceDone,
    Wrote(usize),
    SourceFailed(io::Error),
    PipeFailed(io::Error),
}

/// An input channel: bytes flow from the caller (or subscribers) to the process.
struct Outbound {
    role: ChannelRole,
    pipe: Option<BoxedWriter>,
    pending: PendingBytes,
    source: Option<BoxedReader>,
    scratch: Vec<u8>,
    /// Stay open while empty so later commands can still be written.
    keep_open: bool,
    written: usize,
}

impl Outbound {
    fn new(
        role: ChannelRole,
        pipe: Option<BoxedWriter>,
        source: Option<Source>,
        keep_open: bool,
    ) -> Self {
        let (pending, source) = match source {
            Some(Source::Buffer(data)) => (PendingBytes::from_vec(data), None),
            Some(Source::Stream(reader)) => (PendingBytes::new(), Some(reader)),
            None => (PendingBytes::new(), None),
        };
        Self {
            role,
            pipe,
            pending,
            source,
            scratch: vec![0; CHUNK_SIZE],
            keep_open,
            written: 0,
        }
    }

    fn is_open(&self) -> bool {
        self.pipe.is_some()
    }

    /// Append bytes for the process. Returns false if the channel is closed.
    fn queue(&mut self, bytes: &[u8]) -> bool {
        if !self.is_open() {
            return false;
        }
        self.pending.extend(bytes);
        true
    }

    /// Write one chunk, refilling from the caller source first when empty.
    ///
    /// Never completes while there is nothing to do.
    async fn step(&mut self) -> OutboundStep {
        let Some(pipe) = self.pipe.as_mut() else {
            return std::future::pending().await;
        };

        if self.pending.is_empty() {
            let Some(source) = self.source.as_mut() else {
                return std::future::pending().await;
            };
            return match source.read(&mut self.scratch).await {
                Ok(0) => OutboundStep::SourceDone,
                Ok(n) => {
                    self.pending.extend(&self.scratch[..n]);
                    OutboundStep::Filled
                }
                Err(e) => OutboundStep::SourceFailed(e),
            };
        }

        match pipe.write(self.pending.chunk()).await {
            Ok(0) => OutboundStep::PipeFailed(io::ErrorKind::WriteZero.into()),
            Ok(n) => {
                self.pending.advance(n);
                OutboundStep::Wrote(n)
            }
            Err(e) => OutboundStep::PipeFailed(e),
        }
    }

    fn settle(&mut self, step: OutboundStep) -> Result<(), MultiplexError> {
        match step {
            OutboundStep::Filled => {}
            OutboundStep::SourceDone => self.source = None,
            OutboundStep::Wrote(n) => self.written += n,
            OutboundStep::SourceFailed(e) => {
                return Err(MultiplexError::Source {
                    role: self.role,
                    source: e,
                })
            }
            OutboundStep::PipeFailed(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::BrokenPipe | io::ErrorKind::WriteZero
                ) =>
            {
                tracing::debug!(role = %self.role, written = self.written, "Process stopped reading");
                self.abandon_remaining();
            }
            OutboundStep::PipeFailed(e) => {
                return Err(MultiplexError::Channel {
                    role: self.role,
                    source: e,
                })
            }
        }
        Ok(())
    }

    /// Close the pipe once everything has been written.
    fn close_if_drained(&mut self) {
        if self.is_open() && !self.keep_open && self.pending.is_empty() && self.source.is_none() {
            tracing::trace!(role = %self.role, written = self.written, "Closing input channel");
            self.pipe = None;
        }
    }

    /// Close the pipe and drop whatever was not written.
    fn abandon_remaining(&mut self) {
        let dropped = self.pending.discard();
        if dropped > 0 || self.source.is_some() {
            tracing::debug!(role = %self.role, dropped, "Abandoning unsent input");
        }
        self.source = None;
        self.pipe = None;
    }
}

/// An output channel read from the process.
struct Inbound {
    role: ChannelRole,
    pipe: Option<BoxedReader>,
    scratch: Vec<u8>,
    lines: LineBuffer,
}

impl Inbound {
    fn new(role: ChannelRole, pipe: Option<BoxedReader>) -> Self {
        Self {
            role,
            pipe,
            scratch: vec![0; CHUNK_SIZE],
            lines: LineBuffer::new(),
        }
    }

    fn is_open(&self) -> bool {
        self.pipe.is_some()
    }

    /// Read one chunk. Never completes once the channel is closed.
    async fn read(&mut self) -> io::Result<usize> {
        match self.pipe.as_mut() {
            Some(pipe) => pipe.read(&mut self.scratch).await,
            None => std::future::pending().await,
        }
    }

    fn filled(&self, n: usize) -> &[u8] {
        &self.scratch[..n]
    }

    /// Lines completed by the last `n` bytes read.
    fn lines(&mut self, n: usize) -> Vec<Vec<u8>> {
        self.lines.push(&self.scratch[..n])
    }

    /// Close at end-of-stream, returning an unterminated final line.
    fn close(&mut self) -> Option<Vec<u8>> {
        tracing::trace!(role = %self.role, "Output channel reached end-of-stream");
        self.pipe = None;
        self.lines.finish()
    }

    fn failed(&self, source: io::Error) -> MultiplexError {
        MultiplexError::Channel {
            role: self.role,
            source,
        }
    }
}

/// Destination for primary output bytes.
enum OutputSink {
    Buffer(Vec<u8>),
    Stream {
        writer: BoxedWriter,
        queued: PendingBytes,
    },
}

impl From<Sink> for OutputSink {
    fn from(sink: Sink) -> Self {
        match sink {
            Sink::Buffer => Self::Buffer(Vec::new()),
            Sink::Stream(writer) => Self::Stream {
                writer,
                queued: PendingBytes::new(),
            },
        }
    }
}

impl OutputSink {
    fn accept(&mut self, bytes: &[u8]) {
        match self {
            Self::Buffer(buffer) => buffer.extend_from_slice(bytes),
            Self::Stream { queued, .. } => queued.extend(bytes),
        }
    }

    /// False while a stream sink has a full chunk waiting, which pauses
    /// reads from the process.
    fn has_capacity(&self) -> bool {
        match self {
            Self::Buffer(_) => true,
            Self::Stream { queued, .. } => queued.len() < CHUNK_SIZE,
        }
    }

    /// Write one queued chunk. Never completes while nothing is queued.
    async fn write_some(&mut self) -> io::Result<()> {
        match self {
            Self::Stream { writer, queued } if !queued.is_empty() => {
                let n = writer.write(queued.chunk()).await?;
                if n == 0 {
                    return Err(io::ErrorKind::WriteZero.into());
                }
                queued.advance(n);
                Ok(())
            }
            _ => std::future::pending().await,
        }
    }

    /// Flush everything still queued and return the in-memory output.
    async fn finish(self) -> io::Result<Vec<u8>> {
        match self {
            Self::Buffer(buffer) => Ok(buffer),
            Self::Stream {
                mut writer,
                mut queued,
            } => {
                while !queued.is_empty() {
                    let n = writer.write(queued.chunk()).await?;
                    if n == 0 {
                        return Err(io::ErrorKind::WriteZero.into());
                    }
                    queued.advance(n);
                }
                writer.flush().await?;
                writer.shutdown().await?;
                Ok(Vec::new())
            }
        }
    }
}
