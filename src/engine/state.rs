//! Engine lifecycle and per-run state.

use serde::{Deserialize, Serialize};

use crate::classify::ErrorKind;

/// Lifecycle phase of an [`Engine`](super::Engine).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnginePhase {
    /// No operation set.
    #[default]
    Idle,
    /// Operation set, ready to run.
    Configured,
    Running,
    Completed,
}

/// Reply state for the passphrase request on the line being dispatched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum PassphraseReply {
    #[default]
    Unanswered,
    Declined,
    Answered,
}

/// Mutable state scoped to a single run.
///
/// Handlers receive this for every line they observe. It is rebuilt from
/// scratch on every reset and never carried over between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunState {
    error_kind: ErrorKind,
    passphrase_requests: i32,
    commands: Vec<u8>,
    reply: PassphraseReply,
}

impl RunState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current classification.
    #[must_use]
    pub fn error_kind(&self) -> ErrorKind {
        self.error_kind
    }

    /// Replace the classification if `kind` is more severe than the current one.
    ///
    /// Returns true if the classification changed.
    pub fn escalate(&mut self, kind: ErrorKind) -> bool {
        if !self.error_kind.is_escalated_by(kind) {
            return false;
        }
        tracing::debug!(from = ?self.error_kind, to = ?kind, "Error kind escalated");
        self.error_kind = kind;
        true
    }

    /// Outstanding passphrase requests (`NEED_PASSPHRASE` minus `GOOD_PASSPHRASE`).
    #[must_use]
    pub fn passphrase_requests(&self) -> i32 {
        self.passphrase_requests
    }

    pub fn record_passphrase_request(&mut self) {
        self.passphrase_requests = self.passphrase_requests.saturating_add(1);
    }

    pub fn record_good_passphrase(&mut self) {
        self.passphrase_requests = self.passphrase_requests.saturating_sub(1);
    }

    /// Queue a line for the command channel. A newline is appended.
    pub fn send_command(&mut self, text: &str) {
        self.commands.extend_from_slice(text.as_bytes());
        self.commands.push(b'\n');
    }

    /// Answer the passphrase request of the current line.
    ///
    /// Only the first answer per line is written; later answers and
    /// declines are ignored.
    pub fn reply_passphrase(&mut self, secret: &str) {
        if self.reply == PassphraseReply::Answered {
            return;
        }
        self.reply = PassphraseReply::Answered;
        self.send_command(secret);
    }

    /// Mark the current passphrase request as seen but not answerable.
    pub fn decline_passphrase(&mut self) {
        if self.reply == PassphraseReply::Unanswered {
            self.reply = PassphraseReply::Declined;
        }
    }

    /// Close the dispatch of one line: a declined, unanswered request gets
    /// an empty reply so the process is not left waiting.
    pub(crate) fn settle_line(&mut self) {
        if self.reply == PassphraseReply::Declined {
            self.send_command("");
        }
        self.reply = PassphraseReply::Unanswered;
    }

    /// Take everything queued for the command channel.
    pub fn take_commands(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.commands)
    }

    /// Bytes queued for the command channel but not yet taken.
    #[must_use]
    pub fn pending_commands(&self) -> &[u8] {
        &self.commands
    }

    /// Apply the exit-time rules once the process has been reaped.
    pub fn finalize(&mut self, exit_code: i32) {
        if exit_code == 0 || !self.error_kind.is_none() {
            return;
        }
        let kind = if self.passphrase_requests > 0 {
            ErrorKind::MissingPassphrase
        } else {
            ErrorKind::Unknown
        };
        self.escalate(kind);
    }
}
