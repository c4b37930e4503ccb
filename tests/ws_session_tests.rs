//! Realtime session protocol tests: real server, real WebSocket client,
//! stubbed vendors.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::Message;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use zarex_gateway::config::{EndpointConfig, ServerConfig};
use zarex_gateway::{AppState, create_router};

/// Start the gateway on an ephemeral port.
async fn spawn_app(endpoints: EndpointConfig) -> SocketAddr {
    let mut config = ServerConfig::default();
    config.endpoints = endpoints;
    config.handshake_timeout = Duration::from_secs(2);

    let state = AppState::new(config).unwrap();
    let app = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// What the stub transcription vendor observed.
#[derive(Debug, PartialEq, Eq)]
enum SttStubEvent {
    Connected,
    Disconnected,
}

/// Stub transcription vendor: Begin on connect, then a partial and a final
/// turn after the first audio frame. Reports connection lifecycle on a
/// channel.
async fn spawn_stt_stub(
    transcript: &'static str,
) -> (String, mpsc::UnboundedReceiver<SttStubEvent>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                let _ = tx.send(SttStubEvent::Connected);
                let (mut sink, mut source) = ws.split();
                let _ = sink
                    .send(Message::Text(
                        r#"{"type":"Begin","id":"stub","expires_at":0}"#.into(),
                    ))
                    .await;

                let mut turn_sent = false;
                while let Some(Ok(message)) = source.next().await {
                    match message {
                        Message::Binary(_) if !turn_sent => {
                            turn_sent = true;
                            let partial = json!({
                                "type": "Turn",
                                "turn_order": 0,
                                "transcript": "tell me",
                                "end_of_turn": false,
                                "turn_is_formatted": false
                            });
                            let fin = json!({
                                "type": "Turn",
                                "turn_order": 0,
                                "transcript": transcript,
                                "end_of_turn": true,
                                "turn_is_formatted": true
                            });
                            let _ = sink.send(Message::Text(partial.to_string().into())).await;
                            let _ = sink.send(Message::Text(fin.to_string().into())).await;
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }
                let _ = tx.send(SttStubEvent::Disconnected);
            });
        }
    });

    (format!("ws://{addr}"), rx)
}

fn handshake_json(with_all_keys: bool) -> String {
    if with_all_keys {
        json!({
            "keys": {"assemblyai": "a", "murf": "m", "gemini": "g"},
            "persona": "zarex"
        })
        .to_string()
    } else {
        json!({"keys": {"murf": "m"}}).to_string()
    }
}

async fn expect_close_code(
    ws: &mut (impl StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin),
    expected: u16,
) -> String {
    loop {
        let frame = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for close")
            .expect("socket ended without close")
            .expect("socket error");
        if let Message::Close(Some(frame)) = frame {
            assert_eq!(u16::from(frame.code), expected);
            return frame.reason.to_string();
        }
    }
}

#[tokio::test]
async fn missing_required_keys_close_with_1008_before_any_vendor_call() {
    let (stt_url, mut stt_connections) = spawn_stt_stub("unused").await;
    let addr = spawn_app(EndpointConfig {
        stt_streaming: Some(stt_url),
        ..Default::default()
    })
    .await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();
    ws.send(Message::Text(handshake_json(false).into()))
        .await
        .unwrap();

    let reason = expect_close_code(&mut ws, 1008).await;
    assert!(reason.contains("assemblyai"));
    assert!(reason.contains("gemini"));

    // The vendor never saw a connection.
    assert!(stt_connections.try_recv().is_err());
}

#[tokio::test]
async fn malformed_handshake_closes_with_1003() {
    let addr = spawn_app(EndpointConfig::default()).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();
    ws.send(Message::Text("this is not json".into()))
        .await
        .unwrap();

    expect_close_code(&mut ws, 1003).await;
}

#[tokio::test]
async fn binary_first_frame_closes_with_1003() {
    let addr = spawn_app(EndpointConfig::default()).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();
    ws.send(Message::Binary(vec![1u8, 2, 3].into()))
        .await
        .unwrap();

    expect_close_code(&mut ws, 1003).await;
}

#[tokio::test]
async fn silent_client_is_closed_after_handshake_timeout() {
    let addr = spawn_app(EndpointConfig::default()).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();

    let reason = expect_close_code(&mut ws, 1003).await;
    assert!(reason.contains("timeout"));
}

#[tokio::test]
async fn full_turn_delivers_transcripts_reply_and_ordered_audio() {
    // LLM reply with two sentences, so two synthesis calls and two clips.
    let gemini = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [
                {"content": {"role": "model", "parts": [{"text": "Once upon a time. The end."}]}}
            ]
        })))
        .expect(1)
        .mount(&gemini)
        .await;

    let murf = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/speech/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "audioFile": format!("{}/clip.mp3", murf.uri())
        })))
        .expect(2)
        .mount(&murf)
        .await;
    Mock::given(method("GET"))
        .and(path("/clip.mp3"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp3".to_vec()))
        .expect(2)
        .mount(&murf)
        .await;

    let (stt_url, _stt_connections) = spawn_stt_stub("tell me a story").await;
    let addr = spawn_app(EndpointConfig {
        stt_streaming: Some(stt_url),
        gemini: Some(gemini.uri()),
        murf: Some(murf.uri()),
        ..Default::default()
    })
    .await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();
    ws.send(Message::Text(handshake_json(true).into()))
        .await
        .unwrap();

    // One audio frame triggers the stub's scripted turn.
    ws.send(Message::Binary(vec![0u8; 320].into()))
        .await
        .unwrap();

    // Collect protocol messages until both audio clips arrive.
    let mut kinds: Vec<String> = Vec::new();
    let mut assistant_text = String::new();
    let mut audio_clips = 0;
    while audio_clips < 2 {
        let frame = timeout(Duration::from_secs(10), ws.next())
            .await
            .expect("timed out waiting for protocol message")
            .expect("socket ended early")
            .expect("socket error");
        let Message::Text(text) = frame else { continue };
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let kind = value["type"].as_str().unwrap().to_string();
        if kind == "assistant" {
            assistant_text = value["text"].as_str().unwrap().to_string();
        }
        if kind == "audio" {
            audio_clips += 1;
            assert!(!value["b64"].as_str().unwrap().is_empty());
        }
        kinds.push(kind);
    }

    assert_eq!(assistant_text, "Once upon a time. The end.");

    // Per-session ordering: partial before final before assistant before the
    // first audio clip.
    let position = |kind: &str| kinds.iter().position(|k| k == kind).unwrap();
    assert!(position("partial") < position("final"));
    assert!(position("final") < position("assistant"));
    assert!(position("assistant") < position("audio"));

    let _ = ws.send(Message::Close(None)).await;
}

#[tokio::test]
async fn client_disconnect_releases_the_vendor_stream() {
    let (stt_url, mut stt_events) = spawn_stt_stub("unused").await;
    let addr = spawn_app(EndpointConfig {
        stt_streaming: Some(stt_url),
        ..Default::default()
    })
    .await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();
    ws.send(Message::Text(handshake_json(true).into()))
        .await
        .unwrap();

    // The session opened its vendor stream.
    let connected = timeout(Duration::from_secs(5), stt_events.recv())
        .await
        .expect("timed out waiting for vendor connection")
        .unwrap();
    assert_eq!(connected, SttStubEvent::Connected);

    ws.send(Message::Close(None)).await.unwrap();
    drop(ws);

    // Session cleanup must terminate the vendor stream promptly.
    let disconnected = timeout(Duration::from_secs(5), stt_events.recv())
        .await
        .expect("timed out waiting for vendor stream release")
        .unwrap();
    assert_eq!(disconnected, SttStubEvent::Disconnected);
}

#[tokio::test]
async fn stop_command_acknowledges_with_status() {
    let (stt_url, _stt_connections) = spawn_stt_stub("unused").await;
    let addr = spawn_app(EndpointConfig {
        stt_streaming: Some(stt_url),
        ..Default::default()
    })
    .await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();
    ws.send(Message::Text(handshake_json(true).into()))
        .await
        .unwrap();
    ws.send(Message::Text("stop".into())).await.unwrap();

    // Expect a "stopped" status among the stream of messages.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let remaining = deadline
            .checked_duration_since(tokio::time::Instant::now())
            .expect("timed out waiting for stopped status");
        let frame = timeout(remaining, ws.next())
            .await
            .expect("timed out waiting for stopped status")
            .expect("socket ended early")
            .expect("socket error");
        if let Message::Text(text) = frame {
            let value: serde_json::Value = serde_json::from_str(&text).unwrap();
            if value["type"] == "status" && value["message"] == "stopped" {
                break;
            }
        }
    }

    let _ = ws.send(Message::Close(None)).await;
}
