//! GnuPG process spawning, arguments and version detection.

mod args;
mod backend;
mod pipes;
mod supervisor;
mod version;

pub use args::*;
pub use backend::*;
pub use pipes::ProcessPipes;
pub use supervisor::*;
pub use version::*;
