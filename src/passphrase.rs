//! Passphrase feeding over the command channel.
//!
//! GnuPG announces that it needs a secret with
//! `NEED_PASSPHRASE <sub-key id> <primary key id> <type> <length>` and then
//! reads one line from the command channel. The coordinator answers with the
//! secret bound to that key, or declines so an empty line is sent instead.

use crate::engine::RunState;
use crate::handler::StatusHandler;
use crate::status::StatusEvent;

/// Status keyword announcing a passphrase request.
pub const NEED_PASSPHRASE: &str = "NEED_PASSPHRASE";

/// Status subscriber that answers passphrase requests for bound key ids.
#[derive(Clone, Default)]
pub struct PassphraseCoordinator {
    secrets: Vec<(String, Option<String>)>,
}

impl PassphraseCoordinator {
    /// Create a coordinator with no bound keys. It declines every request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a coordinator answering requests for one key.
    #[must_use]
    pub fn for_key(key_id: &str, secret: Option<&str>) -> Self {
        Self::new().with_key(key_id, secret)
    }

    /// Bind a secret (or explicitly no secret) to a key id.
    ///
    /// Key ids compare case-insensitively. A short id also matches the tail
    /// of a long id or fingerprint. Binding the same id again replaces the
    /// earlier secret.
    #[must_use]
    pub fn with_key(mut self, key_id: &str, secret: Option<&str>) -> Self {
        let secret = secret.map(|s| sanitize_secret(key_id, s));
        let id = normalize_id(key_id);
        match self.secrets.iter_mut().find(|(bound, _)| *bound == id) {
            Some(entry) => entry.1 = secret,
            None => self.secrets.push((id, secret)),
        }
        self
    }

    /// Bind a secret to a key id.
    #[must_use]
    pub fn with_passphrase(self, key_id: &str, secret: &str) -> Self {
        self.with_key(key_id, Some(secret))
    }

    #[must_use]
    pub fn key_count(&self) -> usize {
        self.secrets.len()
    }

    /// Look up the binding for the ids named in a request.
    ///
    /// The sub-key id is tried first, then the primary key id. For each, an
    /// exact match wins, then the longest bound id matching on the tail.
    fn lookup(&self, event: &StatusEvent) -> Option<&Option<String>> {
        [event.arg(0), event.arg(1)]
            .into_iter()
            .flatten()
            .map(normalize_id)
            .find_map(|requested| self.best_match(&requested))
    }

    fn best_match(&self, requested: &str) -> Option<&Option<String>> {
        if let Some((_, secret)) = self.secrets.iter().find(|(bound, _)| bound == requested) {
            return Some(secret);
        }
        self.secrets
            .iter()
            .filter(|(bound, _)| ids_match(bound, requested))
            .max_by_key(|(bound, _)| bound.len())
            .map(|(_, secret)| secret)
    }
}

impl StatusHandler for PassphraseCoordinator {
    fn on_status(&mut self, event: &StatusEvent, state: &mut RunState) {
        if !event.is(NEED_PASSPHRASE) {
            return;
        }

        match self.lookup(event) {
            Some(Some(secret)) => {
                tracing::debug!(key_id = ?event.arg(0), "Answering passphrase request");
                state.reply_passphrase(secret);
            }
            _ => {
                tracing::debug!(key_id = ?event.arg(0), "No passphrase bound for key");
                state.decline_passphrase();
            }
        }
    }
}

impl std::fmt::Debug for PassphraseCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<&String> = self.secrets.iter().map(|(id, _)| id).collect();
        f.debug_struct("PassphraseCoordinator")
            .field("keys", &keys)
            .finish_non_exhaustive()
    }
}

fn normalize_id(id: &str) -> String {
    id.trim().to_ascii_uppercase()
}

fn ids_match(bound: &str, requested: &str) -> bool {
    if bound.is_empty() || requested.is_empty() {
        return false;
    }
    bound == requested || requested.ends_with(bound) || bound.ends_with(requested)
}

/// Cut a secret at its first line terminator; the command protocol is one
/// line per reply.
fn sanitize_secret(key_id: &str, secret: &str) -> String {
    match secret.find(['\n', '\r']) {
        Some(end) => {
            tracing::warn!(%key_id, "Passphrase contains a line break; truncating");
            secret[..end].to_string()
        }
        None => secret.to_string(),
    }
}
