//! Debug echo subscribers that mirror every line into the tracing log.

use crate::engine::RunState;
use crate::status::StatusEvent;

use super::registry::{ErrorLineHandler, StatusHandler};

/// Logs every status event and stderr line at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebugEcho;

impl StatusHandler for DebugEcho {
    fn on_status(&mut self, event: &StatusEvent, _state: &mut RunState) {
        tracing::debug!(keyword = %event.keyword(), args = %event.args(), "gpg status");
    }
}

impl ErrorLineHandler for DebugEcho {
    fn on_error_line(&mut self, line: &str, _state: &mut RunState) {
        tracing::debug!(%line, "gpg stderr");
    }
}
