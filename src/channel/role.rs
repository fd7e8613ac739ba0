//! Logical communication roles between the caller and the process.

use serde::{Deserialize, Serialize};

/// One of the six channels an engine run can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelRole {
    /// Process stdin.
    PrimaryInput,
    /// Process stdout.
    PrimaryOutput,
    /// Process stderr.
    ErrorOutput,
    /// Machine-readable status lines (`--status-fd`).
    StatusOutput,
    /// Replies to prompts (`--command-fd`).
    CommandInput,
    /// Secondary input such as a detached signature's signed data.
    MessageInput,
}

impl ChannelRole {
    pub const ALL: [Self; 6] = [
        Self::PrimaryInput,
        Self::PrimaryOutput,
        Self::ErrorOutput,
        Self::StatusOutput,
        Self::CommandInput,
        Self::MessageInput,
    ];

    /// Returns true if bytes flow from the caller to the process.
    #[must_use]
    pub fn is_input(self) -> bool {
        matches!(
            self,
            Self::PrimaryInput | Self::CommandInput | Self::MessageInput
        )
    }

    /// Returns true if a caller may bind its own source or sink to the role.
    #[must_use]
    pub fn is_caller_bindable(self) -> bool {
        matches!(
            self,
            Self::PrimaryInput | Self::PrimaryOutput | Self::MessageInput
        )
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::PrimaryInput => "primary-input",
            Self::PrimaryOutput => "primary-output",
            Self::ErrorOutput => "error-output",
            Self::StatusOutput => "status-output",
            Self::CommandInput => "command-input",
            Self::MessageInput => "message-input",
        }
    }
}

impl std::fmt::Display for ChannelRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
