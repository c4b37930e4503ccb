//! Streaming transcription client against a local WebSocket stub vendor.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::Message;

use zarex_gateway::core::stt::{AssemblyAiStream, SttEvent, SttStreamConfig};

/// What the stub vendor observed.
#[derive(Debug)]
enum StubEvent {
    Connected,
    Audio(usize),
    Terminate,
    Closed,
}

/// Minimal stand-in for the vendor's streaming endpoint.
///
/// Sends a Begin on connect. After `turn_after_bytes` of audio it emits one
/// partial and one final turn. Reports everything it sees on a channel so
/// tests can assert on the vendor's view of the session.
async fn spawn_stub(turn_after_bytes: usize) -> (String, mpsc::UnboundedReceiver<StubEvent>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
            return;
        };
        let _ = tx.send(StubEvent::Connected);
        let (mut sink, mut source) = ws.split();

        let _ = sink
            .send(Message::Text(
                r#"{"type":"Begin","id":"stub-session","expires_at":0}"#.into(),
            ))
            .await;

        let mut received = 0usize;
        let mut turn_sent = false;

        while let Some(Ok(message)) = source.next().await {
            match message {
                Message::Binary(audio) => {
                    received += audio.len();
                    let _ = tx.send(StubEvent::Audio(audio.len()));
                    if !turn_sent && received >= turn_after_bytes {
                        turn_sent = true;
                        let _ = sink
                            .send(Message::Text(
                                r#"{"type":"Turn","turn_order":0,"transcript":"hello","end_of_turn":false,"turn_is_formatted":false}"#.into(),
                            ))
                            .await;
                        let _ = sink
                            .send(Message::Text(
                                r#"{"type":"Turn","turn_order":0,"transcript":"Hello there.","end_of_turn":true,"turn_is_formatted":true}"#.into(),
                            ))
                            .await;
                    }
                }
                Message::Text(text) if text.contains("Terminate") => {
                    let _ = tx.send(StubEvent::Terminate);
                    let _ = sink
                        .send(Message::Text(
                            r#"{"type":"Termination","audio_duration_ms":1000,"terminated_normally":true}"#.into(),
                        ))
                        .await;
                }
                Message::Close(_) => break,
                _ => {}
            }
        }

        let _ = tx.send(StubEvent::Closed);
    });

    (format!("ws://{addr}"), rx)
}

async fn next_stub_event(rx: &mut mpsc::UnboundedReceiver<StubEvent>) -> StubEvent {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for stub event")
        .expect("stub channel closed")
}

#[tokio::test]
async fn start_waits_for_begin_and_reports_session_id() {
    let (url, mut stub_rx) = spawn_stub(usize::MAX).await;
    let (events_tx, mut events_rx) = mpsc::channel(16);

    let stream = AssemblyAiStream::start(SttStreamConfig::new("key", &url), events_tx)
        .await
        .unwrap();

    assert!(stream.is_active());
    assert_eq!(stream.session_id().await.as_deref(), Some("stub-session"));
    assert!(matches!(
        next_stub_event(&mut stub_rx).await,
        StubEvent::Connected
    ));
    match timeout(Duration::from_secs(5), events_rx.recv())
        .await
        .unwrap()
        .unwrap()
    {
        SttEvent::Begin { session_id } => assert_eq!(session_id, "stub-session"),
        other => panic!("expected Begin, got {other:?}"),
    }

    stream.stop().await;
}

#[tokio::test]
async fn audio_frames_reach_the_vendor() {
    let (url, mut stub_rx) = spawn_stub(usize::MAX).await;
    let (events_tx, _events_rx) = mpsc::channel(16);

    let stream = AssemblyAiStream::start(SttStreamConfig::new("key", &url), events_tx)
        .await
        .unwrap();
    assert!(matches!(
        next_stub_event(&mut stub_rx).await,
        StubEvent::Connected
    ));

    stream.feed(bytes::Bytes::from(vec![0u8; 320])).await.unwrap();
    stream.feed(bytes::Bytes::from(vec![0u8; 640])).await.unwrap();

    match next_stub_event(&mut stub_rx).await {
        StubEvent::Audio(len) => assert_eq!(len, 320),
        other => panic!("expected audio, got {other:?}"),
    }
    match next_stub_event(&mut stub_rx).await {
        StubEvent::Audio(len) => assert_eq!(len, 640),
        other => panic!("expected audio, got {other:?}"),
    }

    stream.stop().await;
}

#[tokio::test]
async fn turn_events_arrive_in_order() {
    let (url, _stub_rx) = spawn_stub(100).await;
    let (events_tx, mut events_rx) = mpsc::channel(16);

    let stream = AssemblyAiStream::start(SttStreamConfig::new("key", &url), events_tx)
        .await
        .unwrap();

    // Skip the Begin event.
    let _ = timeout(Duration::from_secs(5), events_rx.recv()).await.unwrap();

    stream.feed(bytes::Bytes::from(vec![0u8; 200])).await.unwrap();

    match timeout(Duration::from_secs(5), events_rx.recv())
        .await
        .unwrap()
        .unwrap()
    {
        SttEvent::Turn { text, end_of_turn } => {
            assert_eq!(text, "hello");
            assert!(!end_of_turn);
        }
        other => panic!("expected partial turn, got {other:?}"),
    }
    match timeout(Duration::from_secs(5), events_rx.recv())
        .await
        .unwrap()
        .unwrap()
    {
        SttEvent::Turn { text, end_of_turn } => {
            assert_eq!(text, "Hello there.");
            assert!(end_of_turn);
        }
        other => panic!("expected final turn, got {other:?}"),
    }

    stream.stop().await;
}

#[tokio::test]
async fn stop_terminates_the_vendor_session() {
    let (url, mut stub_rx) = spawn_stub(usize::MAX).await;
    let (events_tx, _events_rx) = mpsc::channel(16);

    let stream = AssemblyAiStream::start(SttStreamConfig::new("key", &url), events_tx)
        .await
        .unwrap();
    assert!(matches!(
        next_stub_event(&mut stub_rx).await,
        StubEvent::Connected
    ));

    stream.stop().await;

    assert!(matches!(
        next_stub_event(&mut stub_rx).await,
        StubEvent::Terminate
    ));
    assert!(matches!(
        next_stub_event(&mut stub_rx).await,
        StubEvent::Closed
    ));
}

#[tokio::test]
async fn drop_releases_the_vendor_connection_within_bounded_time() {
    let (url, mut stub_rx) = spawn_stub(usize::MAX).await;
    let (events_tx, _events_rx) = mpsc::channel(16);

    let stream = AssemblyAiStream::start(SttStreamConfig::new("key", &url), events_tx)
        .await
        .unwrap();
    assert!(matches!(
        next_stub_event(&mut stub_rx).await,
        StubEvent::Connected
    ));

    drop(stream);

    // The Drop backstop signals shutdown; the vendor must observe the close
    // without waiting for any timeout to elapse.
    loop {
        match next_stub_event(&mut stub_rx).await {
            StubEvent::Closed => break,
            StubEvent::Terminate => continue,
            other => panic!("unexpected stub event {other:?}"),
        }
    }
}

#[tokio::test]
async fn connect_failure_is_reported_not_hung() {
    // Nothing is listening on this port.
    let (events_tx, _events_rx) = mpsc::channel(16);
    let config = SttStreamConfig::new("key", "ws://127.0.0.1:9");

    let result = timeout(
        Duration::from_secs(15),
        AssemblyAiStream::start(config, events_tx),
    )
    .await
    .expect("start must fail in bounded time");
    assert!(result.is_err());
}
