//! Line parser for the GnuPG status channel.
//!
//! Every significant line on the status channel looks like
//! `[GNUPG:] KEYWORD arg1 arg2 ...`. Lines without the prefix are not
//! control events and are dropped by the status path.

use super::escape::decode_percent;

/// Magic prefix carried by every status line, including the trailing space.
pub const STATUS_PREFIX: &str = "[GNUPG:] ";

/// A single decoded status-protocol event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    keyword: String,
    args: String,
}

impl StatusEvent {
    /// Create an event from a keyword and its raw argument remainder.
    #[must_use]
    pub fn new(keyword: impl Into<String>, args: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            args: args.into(),
        }
    }

    /// The status keyword, e.g. `NEED_PASSPHRASE`.
    #[must_use]
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// Everything after the keyword, exactly as GnuPG wrote it.
    #[must_use]
    pub fn args(&self) -> &str {
        &self.args
    }

    /// Returns true if this event carries the given keyword.
    #[must_use]
    pub fn is(&self, keyword: &str) -> bool {
        self.keyword == keyword
    }

    /// Space-separated argument tokens.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.args.split(' ').filter(|t| !t.is_empty())
    }

    /// The argument token at `index` (0 is the first token after the keyword).
    #[must_use]
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.tokens().nth(index)
    }

    /// The argument remainder with percent escapes decoded.
    ///
    /// Free-text fields such as user ids are escaped by GnuPG; decode them
    /// before showing them to a user.
    #[must_use]
    pub fn decoded_args(&self) -> String {
        decode_percent(&self.args)
    }
}

impl std::fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.args.is_empty() {
            write!(f, "{}", self.keyword)
        } else {
            write!(f, "{} {}", self.keyword, self.args)
        }
    }
}

/// Stateless parser for status channel lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusParser;

impl StatusParser {
    /// Parse one completed line (without or with its trailing newline).
    ///
    /// Returns `None` for lines that do not start with [`STATUS_PREFIX`] or
    /// that carry no keyword.
    #[must_use]
    pub fn parse_line(line: &[u8]) -> Option<StatusEvent> {
        let line = trim_line_end(line);
        let rest = line.strip_prefix(STATUS_PREFIX.as_bytes())?;
        let rest = String::from_utf8_lossy(rest);

        let (keyword, args) = match rest.split_once(' ') {
            Some((keyword, args)) => (keyword, args),
            None => (rest.as_ref(), ""),
        };

        if keyword.is_empty() {
            return None;
        }

        Some(StatusEvent::new(keyword, args))
    }
}

/// Strip a trailing `\n` and `\r` from a raw line.
pub(crate) fn trim_line_end(mut line: &[u8]) -> &[u8] {
    if let Some(stripped) = line.strip_suffix(b"\n") {
        line = stripped;
    }
    if let Some(stripped) = line.strip_suffix(b"\r") {
        line = stripped;
    }
    line
}
