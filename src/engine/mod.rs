//! The engine facade: one operation, one process, one classified result.

mod error;
mod runner;
mod state;

pub use error::*;
pub use runner::*;
pub use state::*;
