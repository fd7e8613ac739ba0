//! Engine tests against a scripted gpg stand-in.

mod deadlock_test;
mod double;
mod interrupt_test;
mod lifecycle_test;
mod roundtrip_test;
mod scenario_test;

/// Verify the public engine surface is exported from the library.
#[test]
fn test_engine_types_exported() {
    use gpg_engine::channel::{ChannelRole, ChannelSet, Sink, Source, CHUNK_SIZE};
    use gpg_engine::classify::{ErrorClassifier, ErrorKind, StatusSignal};
    use gpg_engine::config::{ConfigLoader, EngineConfig};
    use gpg_engine::engine::{Engine, EngineError, EnginePhase, RunState};
    use gpg_engine::handler::{DebugEcho, HandlerRegistry};
    use gpg_engine::multiplex::{ChannelMultiplexer, MultiplexError, MultiplexReport};
    use gpg_engine::operation::{Operation, MESSAGE_INPUT_PLACEHOLDER};
    use gpg_engine::passphrase::PassphraseCoordinator;
    use gpg_engine::process::{ChannelBackend, GpgArgsBuilder, GpgVersion, ProcessSpawnError};
    use gpg_engine::status::{ImportResult, StatusEvent, StatusParser};

    let _ = Engine::new(EngineConfig::default());
    let _ = ConfigLoader::new();
    let _ = ChannelSet::new();
    let _ = HandlerRegistry::new();
    let _ = RunState::new();
    let _ = GpgArgsBuilder::new();
    let _ = PassphraseCoordinator::new();
    let _ = Operation::new("--decrypt", [MESSAGE_INPUT_PLACEHOLDER]);
    let _ = (ErrorClassifier, DebugEcho, Sink::Buffer, Source::from("x"));
    let _ = StatusParser::parse_line(b"[GNUPG:] NODATA 1").map(|e: StatusEvent| e);
    let _: Option<ImportResult> = None;
    let _: Option<MultiplexReport> = None;
    let _: Option<StatusSignal> = None;
    let _: Option<GpgVersion> = GpgVersion::parse("gpg (GnuPG) 2.4.5");
    let _: fn(ChannelRole) -> EngineError = EngineError::InvalidBinding;
    let _: fn(std::io::Error) -> MultiplexError = MultiplexError::Sink;
    let _: fn(std::io::Error) -> ProcessSpawnError = ProcessSpawnError::Io;
    let _: fn(ChannelMultiplexer) -> ChannelMultiplexer = |m| m;

    assert_eq!(CHUNK_SIZE, 8192);
    assert_eq!(ErrorKind::default(), ErrorKind::None);
    assert_eq!(EnginePhase::default(), EnginePhase::Idle);
    assert_eq!(ChannelBackend::Files.supported(), ChannelBackend::Files);
}
