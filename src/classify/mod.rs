//! Error classification from status keywords, stderr text and exit codes.

mod classifier;
mod kind;

pub use classifier::*;
pub use kind::*;
