//! Subscriber traits and the ordered registry that routes lines to them.

use crate::engine::RunState;
use crate::status::StatusEvent;

/// A subscriber for status-channel events.
///
/// Called synchronously from the multiplexer loop; implementations must not
/// block.
pub trait StatusHandler: Send {
    fn on_status(&mut self, event: &StatusEvent, state: &mut RunState);
}

/// A subscriber for lines written to the error channel (stderr).
pub trait ErrorLineHandler: Send {
    fn on_error_line(&mut self, line: &str, state: &mut RunState);
}

impl<F> StatusHandler for F
where
    F: FnMut(&StatusEvent, &mut RunState) + Send,
{
    fn on_status(&mut self, event: &StatusEvent, state: &mut RunState) {
        self(event, state);
    }
}

impl<F> ErrorLineHandler for F
where
    F: FnMut(&str, &mut RunState) + Send,
{
    fn on_error_line(&mut self, line: &str, state: &mut RunState) {
        self(line, state);
    }
}

/// Ordered list of subscribers for both line streams.
#[derive(Default)]
pub struct HandlerRegistry {
    status: Vec<Box<dyn StatusHandler>>,
    error: Vec<Box<dyn ErrorLineHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a status subscriber.
    pub fn register_status(&mut self, handler: Box<dyn StatusHandler>) {
        self.status.push(handler);
    }

    /// Append an error-line subscriber.
    pub fn register_error(&mut self, handler: Box<dyn ErrorLineHandler>) {
        self.error.push(handler);
    }

    /// Remove every subscriber.
    pub fn clear(&mut self) {
        self.status.clear();
        self.error.clear();
    }

    #[must_use]
    pub fn status_count(&self) -> usize {
        self.status.len()
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.error.len()
    }

    /// Deliver one status event to every subscriber in registration order.
    pub fn dispatch_status(&mut self, event: &StatusEvent, state: &mut RunState) {
        for handler in &mut self.status {
            handler.on_status(event, state);
        }
        state.settle_line();
    }

    /// Deliver one stderr line to every subscriber in registration order.
    pub fn dispatch_error(&mut self, line: &str, state: &mut RunState) {
        for handler in &mut self.error {
            handler.on_error_line(line, state);
        }
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("status", &self.status.len())
            .field("error", &self.error.len())
            .finish()
    }
}
