//! Engine phases, resets and infrastructure failures.

use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use gpg_engine::channel::{ChannelRole, Source};
use gpg_engine::config::EngineConfig;
use gpg_engine::engine::{Engine, EngineError, EnginePhase};
use gpg_engine::process::{ChannelBackend, GpgVersion, ProcessSpawnError};
use gpg_engine::ErrorKind;

use super::double;

#[tokio::test]
async fn completed_engine_requires_reset() {
    let mut engine = double::engine();
    engine.set_operation("--list-keys", Vec::<String>::new()).unwrap();
    engine.run().await.unwrap();
    assert_eq!(engine.phase(), EnginePhase::Completed);

    let err = engine.run().await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidOperation {
            phase: EnginePhase::Completed
        }
    ));
    assert!(engine.set_operation("--echo", Vec::<String>::new()).is_err());

    engine.reset();
    assert_eq!(engine.phase(), EnginePhase::Idle);
    assert_eq!(engine.error_kind(), ErrorKind::None);
    assert_eq!(engine.exit_code(), None);

    engine.set_operation("--echo", Vec::<String>::new()).unwrap();
    engine
        .bind_input(ChannelRole::PrimaryInput, Source::from("again"))
        .unwrap();
    engine.run().await.unwrap();
    assert_eq!(engine.output(), b"again");
    assert_eq!(engine.error_kind(), ErrorKind::None);
}

#[test]
fn reset_drops_custom_subscribers() {
    let mut engine = double::engine();
    engine.register_status_handler(gpg_engine::passphrase::PassphraseCoordinator::new());
    assert_eq!(engine.status_handler_count(), 2);

    engine.reset();
    engine.reset();
    assert_eq!(engine.status_handler_count(), 1);
    assert_eq!(engine.error_handler_count(), 1);
}

#[tokio::test]
async fn missing_binary_is_spawn_error() {
    let mut engine = double::engine_for(Path::new("/nonexistent/bin/gpg"));
    engine.set_operation("--list-keys", Vec::<String>::new()).unwrap();

    let err = engine.run().await.unwrap_err();

    assert!(matches!(
        err,
        EngineError::Spawn(ProcessSpawnError::NotFound(_))
    ));
    assert_eq!(engine.phase(), EnginePhase::Completed);
    assert_eq!(engine.exit_code(), None);
}

#[tokio::test]
async fn non_executable_binary_is_permission_denied() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gpg");
    std::fs::write(&path, "#!/bin/sh\n").unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

    let mut engine = double::engine_for(&path);
    engine.set_operation("--list-keys", Vec::<String>::new()).unwrap();

    let err = engine.run().await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Spawn(ProcessSpawnError::PermissionDenied(_))
    ));
}

#[tokio::test]
async fn global_arguments_precede_operation() {
    let mut engine = Engine::new(EngineConfig {
        homedir: Some("/tmp/gpg-engine-keys".into()),
        extra_args: vec!["--batch".to_string()],
        ..double::config(ChannelBackend::Pipes)
    });
    engine.set_operation("--argv", ["extra-arg"]).unwrap();

    engine.run().await.unwrap();

    let argv = String::from_utf8(engine.take_output()).unwrap();
    assert!(argv.starts_with(
        "--no-tty --no-secmem-warning --no-permission-warning --exit-on-status-write-error"
    ));
    assert!(argv.contains("--trust-model always"));
    assert!(argv.contains("--pinentry-mode loopback"));
    assert!(argv.contains("--homedir /tmp/gpg-engine-keys --batch"));
    assert!(argv.contains("--status-fd "));
    assert!(argv.contains("--command-fd "));
    assert!(argv.ends_with("--argv extra-arg"));
}

#[tokio::test]
async fn commands_sent_before_run_are_delivered() {
    let mut engine = double::engine();
    engine.set_operation("--commands", Vec::<String>::new()).unwrap();
    engine.send_command("first");
    engine.send_command("second");

    engine.run().await.unwrap();

    assert_eq!(engine.output(), b"first|second");
}

#[tokio::test]
async fn version_detection() {
    let engine = double::engine();
    let version = engine.detect_version().await.unwrap();
    assert_eq!(version, GpgVersion::new(2, 2, 27));
    assert!(version.supports_loopback_pinentry());
    assert_eq!(engine.phase(), EnginePhase::Idle);
}
