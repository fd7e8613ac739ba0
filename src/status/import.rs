//! Typed view of the `IMPORT_RES` status line.

use super::parser::StatusEvent;

/// Status keyword for import summaries.
pub const IMPORT_RES: &str = "IMPORT_RES";

/// Counters reported by GnuPG at the end of an import.
///
/// Fields follow the order GnuPG writes them. Older GnuPG versions emit
/// fewer fields; missing trailing counters read as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportResult {
    pub count: u64,
    pub no_user_id: u64,
    pub imported: u64,
    pub imported_rsa: u64,
    pub unchanged: u64,
    pub new_user_ids: u64,
    pub new_subkeys: u64,
    pub new_signatures: u64,
    pub new_revocations: u64,
    pub secret_read: u64,
    pub secret_imported: u64,
    /// Secret keys left unchanged because they already existed.
    pub secret_unchanged: u64,
    pub skipped_new_keys: u64,
    pub not_imported: u64,
    pub skipped_v3_keys: u64,
}

impl ImportResult {
    /// Parse the counters of an `IMPORT_RES` event.
    ///
    /// Returns `None` for any other keyword or when a counter is not a number.
    #[must_use]
    pub fn from_event(event: &StatusEvent) -> Option<Self> {
        if !event.is(IMPORT_RES) {
            return None;
        }

        let mut fields = [0_u64; 15];
        for (slot, token) in fields.iter_mut().zip(event.tokens()) {
            *slot = token.parse().ok()?;
        }

        let [count, no_user_id, imported, imported_rsa, unchanged, new_user_ids, new_subkeys, new_signatures, new_revocations, secret_read, secret_imported, secret_unchanged, skipped_new_keys, not_imported, skipped_v3_keys] =
            fields;

        Some(Self {
            count,
            no_user_id,
            imported,
            imported_rsa,
            unchanged,
            new_user_ids,
            new_subkeys,
            new_signatures,
            new_revocations,
            secret_read,
            secret_imported,
            secret_unchanged,
            skipped_new_keys,
            not_imported,
            skipped_v3_keys,
        })
    }

    /// Returns true if at least one secret key was a duplicate.
    #[must_use]
    pub fn has_duplicate_secret(&self) -> bool {
        self.secret_unchanged > 0
    }
}
