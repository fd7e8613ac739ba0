//! GnuPG process spawning and control.
//!
//! This module wires the channel plan to the spawned process: stdio is
//! always piped, while status, command and message channels use either extra
//! inherited pipes or temporary files depending on the [`ChannelBackend`].

use std::io::Write as _;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};

use crate::channel::{BoxedReader, BoxedWriter, ChannelSet, Source};
use crate::operation::Operation;

use super::backend::ChannelBackend;
use super::pipes::ProcessPipes;

/// Error type for process spawning.
#[derive(thiserror::Error, Debug)]
pub enum ProcessSpawnError {
    /// The binary was not found.
    #[error("GnuPG binary not found: {0}")]
    NotFound(PathBuf),
    /// Permission denied when spawning.
    #[error("Permission denied executing {0}")]
    PermissionDenied(PathBuf),
    /// Extra channel pipes could not be created.
    #[error("Failed to create channel pipes: {0}")]
    Pipe(#[source] std::io::Error),
    /// A file-backed channel could not be prepared.
    #[error("Failed to prepare channel file: {0}")]
    ChannelFile(#[source] std::io::Error),
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProcessSpawnError {
    /// Create a `ProcessSpawnError` from an I/O error, classifying common cases.
    fn from_io(binary: &std::path::Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(binary.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(binary.to_path_buf()),
            _ => Self::Io(err),
        }
    }
}

/// Cooperative control over a running process.
pub trait ProcessControl {
    /// Ask the process to stop (SIGTERM on Unix).
    fn terminate(&mut self);
    /// Stop the process unconditionally.
    fn kill(&mut self);
}

/// Everything needed to launch one GnuPG invocation.
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub binary: PathBuf,
    /// Global arguments from [`GpgArgsBuilder`](super::GpgArgsBuilder).
    pub global_args: Vec<String>,
    pub operation: Operation,
    pub backend: ChannelBackend,
    /// Commands known before spawn. Only used by the file backend, which
    /// cannot accept commands later.
    pub preloaded_commands: Vec<u8>,
}

/// Temporary files backing channels under [`ChannelBackend::Files`].
///
/// Dropping them deletes the files.
#[derive(Debug, Default)]
struct ChannelFiles {
    status: Option<NamedTempFile>,
    message: Option<NamedTempFile>,
    command: Option<NamedTempFile>,
}

/// A running GnuPG process.
#[derive(Debug)]
pub struct GpgProcess {
    child: Child,
    backend: ChannelBackend,
    files: ChannelFiles,
    argv: Vec<String>,
}

impl GpgProcess {
    /// Spawn GnuPG with the given request and caller channel bindings.
    ///
    /// Under the file backend the message input is consumed here and
    /// written to a temporary file before the process starts.
    ///
    /// # Errors
    ///
    /// Returns `ProcessSpawnError` if channels cannot be prepared or the
    /// process fails to spawn.
    pub async fn spawn(
        request: &SpawnRequest,
        channels: &mut ChannelSet,
    ) -> Result<(Self, ProcessPipes), ProcessSpawnError> {
        match request.backend.supported() {
            #[cfg(unix)]
            ChannelBackend::Pipes => Self::spawn_with_pipes(request, channels),
            _ => Self::spawn_with_files(request, channels).await,
        }
    }

    #[cfg(unix)]
    fn spawn_with_pipes(
        request: &SpawnRequest,
        channels: &ChannelSet,
    ) -> Result<(Self, ProcessPipes), ProcessSpawnError> {
        use super::pipes::ExtraPipes;

        let with_message = channels.has_message_input() || request.operation.uses_message_input();
        let extra = ExtraPipes::create(with_message).map_err(ProcessSpawnError::Pipe)?;

        let mut channel_args = vec![
            "--status-fd".to_string(),
            extra.status_fd().to_string(),
            "--command-fd".to_string(),
            extra.command_fd().to_string(),
        ];
        let message_ref = extra.message_fd().map(|fd| {
            channel_args.push("--enable-special-filenames".to_string());
            format!("-&{fd}")
        });

        let argv = build_argv(request, channel_args, message_ref.as_deref());
        let mut cmd = base_command(request, &argv);
        extra.inherit_into(&mut cmd);

        let child = cmd
            .spawn()
            .map_err(|e| ProcessSpawnError::from_io(&request.binary, e))?;
        let (status, command, message) = extra.into_parent().map_err(ProcessSpawnError::Pipe)?;

        let mut process = Self {
            child,
            backend: ChannelBackend::Pipes,
            files: ChannelFiles::default(),
            argv,
        };
        let mut pipes = process.stdio_pipes();
        pipes.status = Some(status);
        pipes.command = Some(command);
        pipes.message = message;

        process.log_spawned();
        Ok((process, pipes))
    }

    async fn spawn_with_files(
        request: &SpawnRequest,
        channels: &mut ChannelSet,
    ) -> Result<(Self, ProcessPipes), ProcessSpawnError> {
        let mut files = ChannelFiles {
            status: Some(NamedTempFile::new().map_err(ProcessSpawnError::ChannelFile)?),
            ..ChannelFiles::default()
        };

        let mut channel_args = Vec::new();
        if let Some(status) = &files.status {
            channel_args.push("--status-file".to_string());
            channel_args.push(status.path().display().to_string());
        }

        if !request.preloaded_commands.is_empty() {
            let mut file = NamedTempFile::new().map_err(ProcessSpawnError::ChannelFile)?;
            file.write_all(&request.preloaded_commands)
                .and_then(|()| file.flush())
                .map_err(ProcessSpawnError::ChannelFile)?;
            channel_args.push("--command-file".to_string());
            channel_args.push(file.path().display().to_string());
            files.command = Some(file);
        }

        let message = match channels.message_input.take() {
            Some(source) => Some(source),
            None if request.operation.uses_message_input() => Some(Source::Buffer(Vec::new())),
            None => None,
        };
        if let Some(source) = message {
            let file = write_message_file(source)
                .await
                .map_err(ProcessSpawnError::ChannelFile)?;
            files.message = Some(file);
        }

        let message_ref = files
            .message
            .as_ref()
            .map(|file| file.path().display().to_string());
        let argv = build_argv(request, channel_args, message_ref.as_deref());
        let mut cmd = base_command(request, &argv);

        let child = cmd
            .spawn()
            .map_err(|e| ProcessSpawnError::from_io(&request.binary, e))?;

        let mut process = Self {
            child,
            backend: ChannelBackend::Files,
            files,
            argv,
        };
        let pipes = process.stdio_pipes();

        process.log_spawned();
        Ok((process, pipes))
    }

    fn stdio_pipes(&mut self) -> ProcessPipes {
        ProcessPipes {
            stdin: self
                .child
                .stdin
                .take()
                .map(|p| Box::new(p) as BoxedWriter),
            stdout: self
                .child
                .stdout
                .take()
                .map(|p| Box::new(p) as BoxedReader),
            stderr: self
                .child
                .stderr
                .take()
                .map(|p| Box::new(p) as BoxedReader),
            ..ProcessPipes::default()
        }
    }

    fn log_spawned(&self) {
        tracing::info!(
            pid = ?self.id(),
            backend = ?self.backend,
            operation = %self.argv.first().map_or("", String::as_str),
            "Spawned gpg process"
        );
        tracing::debug!(argv = ?self.argv, "gpg command line");
    }

    /// Arguments the process was started with (without the binary).
    #[must_use]
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    #[must_use]
    pub fn backend(&self) -> ChannelBackend {
        self.backend
    }

    /// Get the process ID, if still running.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for the process to exit and return its exit code.
    ///
    /// A process killed by a signal reports `128 + signal` on Unix.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting fails.
    pub async fn wait(&mut self) -> std::io::Result<i32> {
        let status = self.child.wait().await?;
        Ok(exit_code(status))
    }

    /// Contents of the status file under the file backend.
    ///
    /// Returns `None` for the pipe backend. Call after [`wait`](Self::wait).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub async fn read_status_file(&self) -> std::io::Result<Option<Vec<u8>>> {
        match &self.files.status {
            Some(file) => tokio::fs::read(file.path()).await.map(Some),
            None => Ok(None),
        }
    }
}

impl ProcessControl for GpgProcess {
    fn terminate(&mut self) {
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = self.id() {
                let nix_pid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
                if let Err(e) = kill(nix_pid, Signal::SIGTERM) {
                    tracing::debug!(error = %e, "SIGTERM failed");
                }
                return;
            }
        }

        self.kill();
    }

    fn kill(&mut self) {
        if let Err(e) = self.child.start_kill() {
            tracing::debug!(error = %e, "Kill failed, process likely exited");
        }
    }
}

fn build_argv(request: &SpawnRequest, channel_args: Vec<String>, message_ref: Option<&str>) -> Vec<String> {
    let mut argv = request.global_args.clone();
    argv.extend(channel_args);
    argv.extend(request.operation.resolve_args(message_ref));
    argv
}

fn base_command(request: &SpawnRequest, argv: &[String]) -> Command {
    let mut cmd = Command::new(&request.binary);
    cmd.args(argv)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

/// Copy a message source into a fresh temporary file. Streams are copied
/// chunk by chunk.
async fn write_message_file(source: Source) -> std::io::Result<NamedTempFile> {
    let temp = NamedTempFile::new()?;
    let mut file = tokio::fs::File::from_std(temp.reopen()?);
    match source {
        Source::Buffer(data) => file.write_all(&data).await?,
        Source::Stream(mut reader) => {
            let copied = tokio::io::copy(&mut reader, &mut file).await?;
            tracing::trace!(copied, "Message input spooled to file");
        }
    }
    file.flush().await?;
    Ok(temp)
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    -1
}
