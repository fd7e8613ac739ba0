//! GPG Engine - Deadlock-free GnuPG subprocess runs with status-protocol decoding.

pub mod channel;
pub mod classify;
pub mod config;
pub mod engine;
pub mod handler;
pub mod multiplex;
pub mod operation;
pub mod passphrase;
pub mod process;
pub mod status;

pub use classify::ErrorKind;
pub use engine::{Engine, EngineError};
