//! Process pipe handles and the extra descriptor pipes used on Unix.

use crate::channel::{BoxedReader, BoxedWriter, ChannelRole};

/// Parent-side handles for every channel the process was spawned with.
#[derive(Default)]
pub struct ProcessPipes {
    pub stdin: Option<BoxedWriter>,
    pub stdout: Option<BoxedReader>,
    pub stderr: Option<BoxedReader>,
    pub status: Option<BoxedReader>,
    pub command: Option<BoxedWriter>,
    pub message: Option<BoxedWriter>,
}

impl ProcessPipes {
    /// Roles that have an open pipe.
    #[must_use]
    pub fn open_roles(&self) -> Vec<ChannelRole> {
        let open = [
            (ChannelRole::PrimaryInput, self.stdin.is_some()),
            (ChannelRole::PrimaryOutput, self.stdout.is_some()),
            (ChannelRole::ErrorOutput, self.stderr.is_some()),
            (ChannelRole::StatusOutput, self.status.is_some()),
            (ChannelRole::CommandInput, self.command.is_some()),
            (ChannelRole::MessageInput, self.message.is_some()),
        ];
        open.into_iter()
            .filter_map(|(role, is_open)| is_open.then_some(role))
            .collect()
    }
}

impl std::fmt::Debug for ProcessPipes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessPipes")
            .field("open", &self.open_roles())
            .finish()
    }
}

#[cfg(unix)]
pub(crate) use unix::ExtraPipes;

#[cfg(unix)]
mod unix {
    use std::io;
    use std::os::fd::{AsRawFd, OwnedFd, RawFd};

    use nix::fcntl::{fcntl, FcntlArg, FdFlag, OFlag};
    use nix::unistd::pipe2;
    use tokio::net::unix::pipe;
    use tokio::process::Command;

    use crate::channel::{BoxedReader, BoxedWriter};

    /// A pipe whose `child` end is handed to the process.
    struct ChildPipe {
        child: OwnedFd,
        parent: OwnedFd,
    }

    impl ChildPipe {
        /// Pipe the process writes into.
        fn outbound() -> io::Result<Self> {
            let (read, write) = pipe2(OFlag::O_CLOEXEC)?;
            Ok(Self {
                child: write,
                parent: read,
            })
        }

        /// Pipe the process reads from.
        fn inbound() -> io::Result<Self> {
            let (read, write) = pipe2(OFlag::O_CLOEXEC)?;
            Ok(Self {
                child: read,
                parent: write,
            })
        }
    }

    /// Status, command and optional message pipes beyond stdio.
    ///
    /// All descriptors are created close-on-exec; only the child ends are
    /// made inheritable, inside the forked child, so concurrent spawns never
    /// leak them.
    pub(crate) struct ExtraPipes {
        status: ChildPipe,
        command: ChildPipe,
        message: Option<ChildPipe>,
    }

    impl ExtraPipes {
        pub(crate) fn create(with_message: bool) -> io::Result<Self> {
            Ok(Self {
                status: ChildPipe::outbound()?,
                command: ChildPipe::inbound()?,
                message: with_message.then(ChildPipe::inbound).transpose()?,
            })
        }

        pub(crate) fn status_fd(&self) -> RawFd {
            self.status.child.as_raw_fd()
        }

        pub(crate) fn command_fd(&self) -> RawFd {
            self.command.child.as_raw_fd()
        }

        pub(crate) fn message_fd(&self) -> Option<RawFd> {
            self.message.as_ref().map(|p| p.child.as_raw_fd())
        }

        /// Arrange for the child ends to survive `exec` in the spawned process.
        #[allow(unsafe_code)]
        pub(crate) fn inherit_into(&self, cmd: &mut Command) {
            let fds: Vec<RawFd> = [Some(self.status_fd()), Some(self.command_fd()), self.message_fd()]
                .into_iter()
                .flatten()
                .collect();

            // SAFETY: the hook runs between fork and exec. It only calls
            // fcntl(2), which is async-signal-safe, and does not allocate.
            unsafe {
                cmd.pre_exec(move || {
                    for &fd in &fds {
                        fcntl(fd, FcntlArg::F_SETFD(FdFlag::empty()))?;
                    }
                    Ok(())
                });
            }
        }

        /// Close the child ends and wrap the parent ends for async I/O.
        ///
        /// Must be called after the process has been spawned.
        pub(crate) fn into_parent(
            self,
        ) -> io::Result<(BoxedReader, BoxedWriter, Option<BoxedWriter>)> {
            let Self {
                status,
                command,
                message,
            } = self;

            drop(status.child);
            drop(command.child);
            let status: BoxedReader = Box::new(pipe::Receiver::from_owned_fd(status.parent)?);
            let command: BoxedWriter = Box::new(pipe::Sender::from_owned_fd(command.parent)?);

            let message = match message {
                Some(message) => {
                    drop(message.child);
                    let sender: BoxedWriter = Box::new(pipe::Sender::from_owned_fd(message.parent)?);
                    Some(sender)
                }
                None => None,
            };

            Ok((status, command, message))
        }
    }
}
