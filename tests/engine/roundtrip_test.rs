//! Byte-exact transfer of primary input to primary output.

use gpg_engine::channel::{ChannelRole, Sink, Source};
use gpg_engine::ErrorKind;

use super::double;

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| u8::try_from(i % 251).unwrap()).collect()
}

#[tokio::test]
async fn echo_round_trip_boundary_sizes() {
    for len in [0, 1, 8191, 8192, 8193, 1_000_000] {
        let input = payload(len);
        let mut engine = double::engine();
        engine.set_operation("--echo", Vec::<String>::new()).unwrap();
        engine
            .bind_input(ChannelRole::PrimaryInput, Source::Buffer(input.clone()))
            .unwrap();

        engine.run().await.unwrap();

        assert_eq!(engine.exit_code(), Some(0), "len {len}");
        assert_eq!(engine.error_kind(), ErrorKind::None, "len {len}");
        assert_eq!(engine.output().len(), len);
        assert!(engine.output() == input.as_slice(), "len {len} mismatch");
    }
}

#[tokio::test]
async fn echo_round_trip_through_streams() {
    let input = payload(1_000_000);
    let dir = tempfile::tempdir().unwrap();
    let in_path = dir.path().join("in.bin");
    let out_path = dir.path().join("out.bin");
    std::fs::write(&in_path, &input).unwrap();

    let source = tokio::fs::File::open(&in_path).await.unwrap();
    let sink = tokio::fs::File::create(&out_path).await.unwrap();

    let mut engine = double::engine();
    engine.set_operation("--echo", Vec::<String>::new()).unwrap();
    engine
        .bind_input(ChannelRole::PrimaryInput, Source::stream(source))
        .unwrap();
    engine
        .bind_output(ChannelRole::PrimaryOutput, Sink::stream(sink))
        .unwrap();

    engine.run().await.unwrap();

    assert!(engine.output().is_empty());
    let written = std::fs::read(&out_path).unwrap();
    assert_eq!(written.len(), input.len());
    assert!(written == input);
}

#[tokio::test]
async fn message_input_is_referenced_by_placeholder() {
    use gpg_engine::operation::MESSAGE_INPUT_PLACEHOLDER;

    let mut engine = double::engine();
    engine
        .set_operation("--verify", [MESSAGE_INPUT_PLACEHOLDER, "-"])
        .unwrap();
    engine
        .bind_input(ChannelRole::MessageInput, Source::from("SIG"))
        .unwrap();
    engine
        .bind_input(ChannelRole::PrimaryInput, Source::from("DATA"))
        .unwrap();

    engine.run().await.unwrap();

    assert_eq!(engine.output(), b"sig:SIG data:DATA");
    assert!(engine.succeeded());
}

#[tokio::test]
async fn take_output_leaves_empty_buffer() {
    let mut engine = double::engine();
    engine.set_operation("--echo", Vec::<String>::new()).unwrap();
    engine
        .bind_input(ChannelRole::PrimaryInput, Source::from("hello"))
        .unwrap();
    engine.run().await.unwrap();

    assert_eq!(engine.take_output(), b"hello");
    assert!(engine.output().is_empty());
}
