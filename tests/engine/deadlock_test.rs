//! A process that fills its outputs before reading input must still finish.

use std::time::Duration;

use gpg_engine::channel::{ChannelRole, Source};
use gpg_engine::ErrorKind;

use super::double;

#[tokio::test]
async fn flood_before_read_completes() {
    let input = vec![b'z'; 1_000_000];
    let mut engine = double::engine();
    engine.set_operation("--flood", Vec::<String>::new()).unwrap();
    engine
        .bind_input(ChannelRole::PrimaryInput, Source::Buffer(input.clone()))
        .unwrap();

    let lines = std::sync::Arc::new(std::sync::Mutex::new(0_usize));
    let counter = std::sync::Arc::clone(&lines);
    engine.register_error_handler(move |_: &str, _: &mut gpg_engine::engine::RunState| {
        *counter.lock().unwrap() += 1;
    });

    tokio::time::timeout(Duration::from_secs(30), engine.run())
        .await
        .expect("run deadlocked")
        .unwrap();

    let output = engine.output();
    assert_eq!(output.len(), 300_000 + input.len());
    assert!(output[..300_000].iter().all(|&b| b == b'a'));
    assert!(output[300_000..] == input[..]);
    assert_eq!(*lines.lock().unwrap(), 20_000);
    assert_eq!(engine.error_kind(), ErrorKind::None);
    assert_eq!(engine.exit_code(), Some(0));
}
