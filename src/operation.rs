//! The command and arguments for one engine run.

/// Argument placeholder replaced with a reference to the message input
/// channel when the process is spawned.
///
/// With pipes this becomes `-&N` (GnuPG's special filename for descriptor
/// `N`); with the file fallback it becomes the path of the temporary file.
pub const MESSAGE_INPUT_PLACEHOLDER: &str = "@gpg-engine:message-input";

/// An immutable GnuPG command plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    command: String,
    args: Vec<String>,
}

impl Operation {
    /// Create an operation, e.g. `Operation::new("--decrypt", ["--armor"])`.
    #[must_use]
    pub fn new<I, S>(command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Create an operation without arguments.
    #[must_use]
    pub fn command(command: impl Into<String>) -> Self {
        Self::new(command, std::iter::empty::<String>())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.command
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns true if any argument refers to the message input channel.
    #[must_use]
    pub fn uses_message_input(&self) -> bool {
        self.args.iter().any(|a| a == MESSAGE_INPUT_PLACEHOLDER)
    }

    /// Command followed by arguments, with the message placeholder replaced.
    ///
    /// When `message_ref` is `None` the placeholder is passed through as is.
    #[must_use]
    pub fn resolve_args(&self, message_ref: Option<&str>) -> Vec<String> {
        std::iter::once(self.command.clone())
            .chain(self.args.iter().map(|arg| match message_ref {
                Some(reference) if arg == MESSAGE_INPUT_PLACEHOLDER => reference.to_string(),
                _ => arg.clone(),
            }))
            .collect()
    }
}
