//! Channel roles, caller bindings and transfer buffers.

mod binding;
mod buffer;
mod role;

pub use binding::*;
pub use buffer::*;
pub use role::*;
