//! Built-in subscriber that classifies status events and stderr lines.

use std::sync::LazyLock;

use regex::RegexSet;

use crate::engine::RunState;
use crate::handler::{ErrorLineHandler, StatusHandler};
use crate::status::{ImportResult, StatusEvent};

use super::kind::ErrorKind;

/// Stderr patterns, in the same order as [`STDERR_KINDS`].
const STDERR_PATTERNS: [&str; 3] = [
    r"no valid OpenPGP data found",
    r"secret key not available",
    r"public key not found",
];

const STDERR_KINDS: [ErrorKind; 3] = [
    ErrorKind::NoData,
    ErrorKind::KeyNotFound,
    ErrorKind::KeyNotFound,
];

static STDERR_RULES: LazyLock<Option<RegexSet>> = LazyLock::new(|| {
    RegexSet::new(STDERR_PATTERNS)
        .inspect_err(|e| tracing::error!(error = %e, "Invalid stderr classification pattern"))
        .ok()
});

/// What a single status event means for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSignal {
    /// The event maps to an error kind.
    Kind(ErrorKind),
    /// A passphrase was requested.
    PassphraseNeeded,
    /// A passphrase was accepted.
    PassphraseAccepted,
}

/// Maps status events and stderr lines to [`ErrorKind`] escalations.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify one status event. The first matching rule wins.
    #[must_use]
    pub fn classify_status(event: &StatusEvent) -> Option<StatusSignal> {
        let signal = match event.keyword() {
            "BAD_PASSPHRASE" => StatusSignal::Kind(ErrorKind::BadPassphrase),
            "MISSING_PASSPHRASE" => StatusSignal::Kind(ErrorKind::MissingPassphrase),
            "NODATA" => StatusSignal::Kind(ErrorKind::NoData),
            "DELETE_PROBLEM" => match event.arg(0) {
                Some("1") => StatusSignal::Kind(ErrorKind::KeyNotFound),
                Some("2") => StatusSignal::Kind(ErrorKind::DeletePrivateKeyFirst),
                _ => return None,
            },
            "IMPORT_RES" => {
                let result = ImportResult::from_event(event)?;
                if !result.has_duplicate_secret() {
                    return None;
                }
                StatusSignal::Kind(ErrorKind::DuplicateKey)
            }
            "NEED_PASSPHRASE" => StatusSignal::PassphraseNeeded,
            "GOOD_PASSPHRASE" => StatusSignal::PassphraseAccepted,
            _ => return None,
        };
        Some(signal)
    }

    /// Classify one stderr line.
    #[must_use]
    pub fn classify_error_line(line: &str) -> Option<ErrorKind> {
        let rules = STDERR_RULES.as_ref()?;
        rules
            .matches(line)
            .iter()
            .next()
            .map(|index| STDERR_KINDS[index])
    }
}

impl StatusHandler for ErrorClassifier {
    fn on_status(&mut self, event: &StatusEvent, state: &mut RunState) {
        match Self::classify_status(event) {
            Some(StatusSignal::Kind(kind)) => {
                state.escalate(kind);
            }
            Some(StatusSignal::PassphraseNeeded) => state.record_passphrase_request(),
            Some(StatusSignal::PassphraseAccepted) => state.record_good_passphrase(),
            None => {}
        }
    }
}

impl ErrorLineHandler for ErrorClassifier {
    fn on_error_line(&mut self, line: &str, state: &mut RunState) {
        if !state.error_kind().is_none() {
            return;
        }
        if let Some(kind) = Self::classify_error_line(line) {
            state.escalate(kind);
        }
    }
}
