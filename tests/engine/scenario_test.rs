//! End-to-end classification scenarios.

use std::sync::{Arc, Mutex};

use gpg_engine::engine::RunState;
use gpg_engine::passphrase::PassphraseCoordinator;
use gpg_engine::status::StatusEvent;
use gpg_engine::ErrorKind;

use super::double;

#[tokio::test]
async fn bound_secret_is_written_to_command_channel() {
    let mut engine = double::engine();
    engine.set_operation("--decrypt", Vec::<String>::new()).unwrap();
    engine.register_status_handler(PassphraseCoordinator::for_key("ABC123", Some("correct-pw")));

    engine.run().await.unwrap();

    assert_eq!(engine.output(), b"reply=[correct-pw]");
    assert_eq!(engine.exit_code(), Some(0));
    assert_eq!(engine.error_kind(), ErrorKind::None);
    assert_eq!(engine.run_state().passphrase_requests(), 0);
    assert!(engine.succeeded());
}

#[tokio::test]
async fn only_matching_coordinator_answers() {
    let mut engine = double::engine();
    engine.set_operation("--decrypt", Vec::<String>::new()).unwrap();
    engine.register_status_handler(PassphraseCoordinator::for_key("FFFF0000", Some("other")));
    engine.register_status_handler(PassphraseCoordinator::for_key("abc123", Some("correct-pw")));

    engine.run().await.unwrap();

    assert_eq!(engine.output(), b"reply=[correct-pw]");
    assert!(engine.succeeded());
}

#[tokio::test]
async fn wrong_secret_is_bad_passphrase() {
    let mut engine = double::engine();
    engine.set_operation("--decrypt", Vec::<String>::new()).unwrap();
    engine.register_status_handler(PassphraseCoordinator::for_key("ABC123", Some("guess")));

    engine.run().await.unwrap();

    assert_eq!(engine.output(), b"reply=[guess]");
    assert_eq!(engine.exit_code(), Some(2));
    assert_eq!(engine.error_kind(), ErrorKind::BadPassphrase);
    assert!(engine.error_kind().is_retryable());
}

#[tokio::test]
async fn declined_request_gets_empty_reply() {
    let mut engine = double::engine();
    engine.set_operation("--decrypt", Vec::<String>::new()).unwrap();
    engine.register_status_handler(PassphraseCoordinator::for_key("ABC123", None));

    engine.run().await.unwrap();

    assert_eq!(engine.output(), b"reply=[]");
    assert_eq!(engine.error_kind(), ErrorKind::MissingPassphrase);
}

#[tokio::test]
async fn bad_passphrase_outranks_later_signals() {
    let mut engine = double::engine();
    engine
        .set_operation("--bad-passphrase", Vec::<String>::new())
        .unwrap();

    engine.run().await.unwrap();

    assert_eq!(engine.error_kind(), ErrorKind::BadPassphrase);
    assert_eq!(engine.exit_code(), Some(2));
}

#[tokio::test]
async fn stderr_public_key_not_found() {
    let mut engine = double::engine();
    engine.set_operation("--list-keys", Vec::<String>::new()).unwrap();

    engine.run().await.unwrap();

    assert_eq!(engine.error_kind(), ErrorKind::KeyNotFound);
    assert!(!engine.succeeded());
}

#[tokio::test]
async fn duplicate_secret_import_exits_zero() {
    let mut engine = double::engine();
    engine.set_operation("--import", Vec::<String>::new()).unwrap();

    engine.run().await.unwrap();

    assert_eq!(engine.error_kind(), ErrorKind::DuplicateKey);
    assert_eq!(engine.exit_code(), Some(0));
    assert!(engine.succeeded());
}

#[tokio::test]
async fn unanswered_request_and_failure_is_missing_passphrase() {
    let mut engine = double::engine();
    engine.set_operation("--sign", Vec::<String>::new()).unwrap();

    engine.run().await.unwrap();

    assert_eq!(engine.run_state().passphrase_requests(), 1);
    assert_eq!(engine.error_kind(), ErrorKind::MissingPassphrase);
    assert_eq!(engine.exit_code(), Some(2));
}

#[tokio::test]
async fn unknown_failure_without_signals() {
    let mut engine = double::engine();
    engine
        .set_operation("--no-such-command", Vec::<String>::new())
        .unwrap();

    engine.run().await.unwrap();

    assert_eq!(engine.error_kind(), ErrorKind::Unknown);
    assert_eq!(engine.exit_code(), Some(2));
}

#[tokio::test]
async fn custom_subscribers_see_events_in_order() {
    let keywords = Arc::new(Mutex::new(Vec::new()));
    let errors = Arc::new(Mutex::new(Vec::new()));

    let mut engine = double::engine();
    engine
        .set_operation("--bad-passphrase", Vec::<String>::new())
        .unwrap();
    let seen = Arc::clone(&keywords);
    engine.register_status_handler(move |event: &StatusEvent, state: &mut RunState| {
        seen.lock()
            .unwrap()
            .push((event.keyword().to_string(), state.error_kind()));
    });
    let seen = Arc::clone(&errors);
    engine.register_error_handler(move |line: &str, _: &mut RunState| {
        seen.lock().unwrap().push(line.to_string());
    });

    engine.run().await.unwrap();

    // Built-in classification runs before custom subscribers.
    assert_eq!(
        *keywords.lock().unwrap(),
        vec![
            ("BAD_PASSPHRASE".to_string(), ErrorKind::BadPassphrase),
            ("NODATA".to_string(), ErrorKind::BadPassphrase),
        ]
    );
    assert_eq!(
        *errors.lock().unwrap(),
        vec!["gpg: no valid OpenPGP data found.".to_string()]
    );
}
