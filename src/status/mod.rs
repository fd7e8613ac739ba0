//! GnuPG status protocol decoding.

mod escape;
mod import;
mod parser;

pub use escape::*;
pub use import::*;
pub use parser::*;
