//! Deadlines and cancellation.

use std::time::{Duration, Instant};

use gpg_engine::engine::{EngineError, EnginePhase};
use gpg_engine::ErrorKind;
use tokio_util::sync::CancellationToken;

use super::double;

#[tokio::test]
async fn deadline_terminates_and_reports_timeout() {
    let mut engine = double::engine();
    engine.set_operation("--hang", Vec::<String>::new()).unwrap();
    engine.set_timeout(Some(Duration::from_millis(300)));

    let started = Instant::now();
    let err = engine.run().await.unwrap_err();

    assert!(matches!(err, EngineError::Timeout(d) if d == Duration::from_millis(300)));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(engine.phase(), EnginePhase::Completed);
    assert_eq!(engine.exit_code(), Some(143));
    assert_eq!(engine.error_kind(), ErrorKind::Unknown);
}

#[tokio::test]
async fn ignored_terminate_escalates_to_kill() {
    let mut engine = double::engine();
    engine
        .set_operation("--ignore-term", Vec::<String>::new())
        .unwrap();
    engine.set_timeout(Some(Duration::from_millis(200)));
    engine.set_kill_grace(Duration::from_millis(200));

    let err = engine.run().await.unwrap_err();

    assert!(matches!(err, EngineError::Timeout(_)));
    assert_eq!(engine.exit_code(), Some(137));
}

#[tokio::test]
async fn cancellation_completes_run() {
    let token = CancellationToken::new();
    let mut engine = double::engine().with_cancellation(token.clone());
    engine.set_operation("--hang", Vec::<String>::new()).unwrap();

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        token.cancel();
    });

    let started = Instant::now();
    engine.run().await.unwrap();
    canceller.await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(engine.phase(), EnginePhase::Completed);
    assert_eq!(engine.exit_code(), Some(143));
    assert_eq!(engine.error_kind(), ErrorKind::Unknown);
}
