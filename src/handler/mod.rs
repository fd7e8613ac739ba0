//! Event routing from the status and error channels to subscribers.

mod debug;
mod registry;

pub use debug::*;
pub use registry::*;
