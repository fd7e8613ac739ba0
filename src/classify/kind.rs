//! Closed set of protocol-level failure kinds.

use serde::{Deserialize, Serialize};

/// Classified outcome of one engine run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    #[default]
    None,
    Unknown,
    BadPassphrase,
    MissingPassphrase,
    DuplicateKey,
    NoData,
    UnsignedKey,
    NotSelfSigned,
    KeyNotFound,
    DeletePrivateKeyFirst,
}

impl ErrorKind {
    /// Severity used for escalation. Higher wins.
    #[must_use]
    pub fn severity(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Unknown => 1,
            Self::DuplicateKey => 2,
            Self::NoData => 3,
            Self::UnsignedKey
            | Self::NotSelfSigned
            | Self::KeyNotFound
            | Self::DeletePrivateKeyFirst => 4,
            Self::MissingPassphrase => 5,
            Self::BadPassphrase => 6,
        }
    }

    /// Returns true if `other` should replace `self` under escalation.
    #[must_use]
    pub fn is_escalated_by(self, other: Self) -> bool {
        other.severity() > self.severity()
    }

    #[must_use]
    pub fn is_none(self) -> bool {
        self == Self::None
    }

    /// Returns true for kinds a caller can fix by retrying with another passphrase.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::BadPassphrase | Self::MissingPassphrase)
    }

    /// Short human-readable description.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::None => "no error",
            Self::Unknown => "unknown error",
            Self::BadPassphrase => "bad passphrase",
            Self::MissingPassphrase => "missing passphrase",
            Self::DuplicateKey => "duplicate key",
            Self::NoData => "no valid OpenPGP data",
            Self::UnsignedKey => "unsigned key",
            Self::NotSelfSigned => "key is not self-signed",
            Self::KeyNotFound => "key not found",
            Self::DeletePrivateKeyFirst => "private key must be deleted first",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}
