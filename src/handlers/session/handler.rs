//! Realtime voice session over `/ws`.
//!
//! Connection lifecycle:
//! 1. Handshake: the first frame must be JSON credentials (plus optional
//!    persona and voice). Missing required keys close the socket with 1008,
//!    a malformed handshake closes with 1003, both before any vendor call.
//! 2. Streaming: binary frames are forwarded to the transcription relay;
//!    `"stop"`/`"EOF"` end the audio stream, `"start"` opens a fresh vendor
//!    stream after a failure.
//! 3. Teardown: client disconnect stops the vendor stream and aborts the
//!    per-connection tasks.
//!
//! Three tasks per connection: this read loop, a sender task draining the
//! outbound queue, and an agent task consuming transcription events and
//! running dispatch and synthesis. Vendor calls never run on the read loop.

use axum::extract::State;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt, stream::SplitSink};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::messages::{
    CLOSE_INVALID_CONFIG, CLOSE_MISSING_KEYS, ClientCommand, Handshake, OutgoingMessage,
};
use super::synthesis::speak_reply;
use crate::core::llm::{GeminiClient, Persona};
use crate::core::search::SerpApiClient;
use crate::core::stt::{
    ASSEMBLYAI_STREAMING_URL, AssemblyAiStream, SttEvent, SttStreamConfig,
};
use crate::core::tts::{BoxedSynthesizer, TtsConfig, create_synthesizer};
use crate::core::weather::WeatherClient;
use crate::dispatch::Dispatcher;
use crate::recording::SessionRecorder;
use crate::session::Session;
use crate::state::AppState;

/// Outbound queue depth. Synthesis is sequential, so this never holds more
/// than a few clips.
const OUTBOUND_QUEUE: usize = 64;

/// Transcription event queue depth.
const EVENT_QUEUE: usize = 64;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_session(socket, state))
}

async fn handle_session(mut socket: WebSocket, state: AppState) {
    // ========================================================================
    // Handshake
    // ========================================================================
    let handshake = match read_handshake(&mut socket, &state).await {
        Ok(handshake) => handshake,
        Err((code, reason)) => {
            warn!("Rejecting session: {}", reason);
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code,
                    reason: reason.into(),
                })))
                .await;
            return;
        }
    };

    let persona = handshake
        .persona
        .as_deref()
        .map(Persona::from_name)
        .unwrap_or_default();
    let credentials = handshake.keys.into_credentials();

    let missing = credentials.missing_required();
    if !missing.is_empty() {
        let reason = format!("missing required API keys: {}", missing.join(", "));
        warn!("Rejecting session: {}", reason);
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: CLOSE_MISSING_KEYS,
                reason: reason.into(),
            })))
            .await;
        return;
    }

    // Vendor clients for this session, from the handshake credentials.
    let endpoints = &state.config.endpoints;
    let llm = match GeminiClient::new(
        credentials.gemini.clone(),
        endpoints.gemini.clone(),
        state.http.clone(),
    ) {
        Ok(llm) => llm,
        Err(e) => {
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: CLOSE_INVALID_CONFIG,
                    reason: e.to_string().into(),
                })))
                .await;
            return;
        }
    };
    let search = credentials
        .serpapi
        .clone()
        .and_then(|key| SerpApiClient::new(key, endpoints.serpapi.clone(), state.http.clone()).ok());
    let weather = credentials
        .weather
        .clone()
        .and_then(|key| WeatherClient::new(key, endpoints.weather.clone(), state.http.clone()).ok());

    let mut tts_config = TtsConfig::new(credentials.murf.clone());
    tts_config.voice_id = handshake.voice_id.clone();
    tts_config.endpoint = endpoints.murf.clone();
    let synthesizer: BoxedSynthesizer =
        match create_synthesizer("murf", tts_config, state.http.clone()) {
            Ok(synthesizer) => synthesizer,
            Err(e) => {
                let _ = socket
                    .send(Message::Close(Some(CloseFrame {
                        code: CLOSE_INVALID_CONFIG,
                        reason: e.to_string().into(),
                    })))
                    .await;
                return;
            }
        };

    let assemblyai_key = credentials.assemblyai.clone();
    let stt_endpoint = endpoints
        .stt_streaming
        .clone()
        .unwrap_or_else(|| ASSEMBLYAI_STREAMING_URL.to_string());

    let session = Session::with_history_cap(persona, credentials, state.config.max_history_entries);
    let session_id = session.id.clone();
    info!(session_id = %session_id, persona = persona.name(), "Session established");

    // ========================================================================
    // Per-connection tasks
    // ========================================================================
    let (ws_sink, mut ws_stream) = socket.split();

    let (out_tx, out_rx) = mpsc::channel::<OutgoingMessage>(OUTBOUND_QUEUE);
    let sender_task = tokio::spawn(run_sender(ws_sink, out_rx));

    let (events_tx, events_rx) = mpsc::channel::<SttEvent>(EVENT_QUEUE);
    let dispatcher = Dispatcher::new(llm, search, weather);
    let agent_task = tokio::spawn(run_agent(
        session,
        dispatcher,
        synthesizer,
        events_rx,
        out_tx.clone(),
    ));

    let _ = out_tx.send(OutgoingMessage::status("connected")).await;

    let mut recorder = state.config.recordings_dir.as_ref().and_then(|dir| {
        SessionRecorder::create(dir, &session_id)
            .map_err(|e| warn!("Recording disabled: {}", e))
            .ok()
    });

    // Open the transcription stream up front; the client can also restart it
    // later with "start".
    let mut stream = start_stream(&assemblyai_key, &stt_endpoint, &events_tx, &out_tx).await;

    // ========================================================================
    // Read loop
    // ========================================================================
    while let Some(frame) = ws_stream.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                debug!(session_id = %session_id, "WebSocket read error: {}", e);
                break;
            }
        };

        match frame {
            Message::Binary(audio) => {
                if let Some(recorder) = recorder.as_mut() {
                    recorder.write_chunk(&audio);
                }
                match stream.as_ref() {
                    Some(active) => {
                        if let Err(e) = active.feed(audio).await {
                            warn!("Dropping audio frame: {}", e);
                        }
                    }
                    None => debug!("Audio frame received with no active stream"),
                }
            }
            Message::Text(text) => match ClientCommand::parse(&text) {
                ClientCommand::Start => {
                    if stream.as_ref().is_some_and(|s| s.is_active()) {
                        debug!("Ignoring start: stream already active");
                    } else {
                        stream =
                            start_stream(&assemblyai_key, &stt_endpoint, &events_tx, &out_tx).await;
                    }
                }
                ClientCommand::Stop => {
                    if let Some(active) = stream.take() {
                        active.stop().await;
                    }
                    let _ = out_tx.send(OutgoingMessage::status("stopped")).await;
                }
                ClientCommand::Unknown => {
                    debug!("Ignoring unknown text frame: {}", text);
                }
            },
            Message::Close(_) => {
                info!(session_id = %session_id, "Client closed the session");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    // ========================================================================
    // Cleanup
    // ========================================================================
    if let Some(active) = stream.take() {
        active.stop().await;
    }
    if let Some(recorder) = recorder.take() {
        recorder.finalize();
    }
    agent_task.abort();
    sender_task.abort();
    info!(session_id = %session_id, "Session closed");
}

/// Read and parse the handshake frame, under the configured timeout.
async fn read_handshake(
    socket: &mut WebSocket,
    state: &AppState,
) -> Result<Handshake, (u16, String)> {
    let frame = timeout(state.config.handshake_timeout, socket.recv())
        .await
        .map_err(|_| (CLOSE_INVALID_CONFIG, "handshake timeout".to_string()))?
        .ok_or((CLOSE_INVALID_CONFIG, "socket closed during handshake".to_string()))?
        .map_err(|e| (CLOSE_INVALID_CONFIG, format!("handshake read failed: {e}")))?;

    let text = match frame {
        Message::Text(text) => text,
        _ => {
            return Err((
                CLOSE_INVALID_CONFIG,
                "handshake must be a JSON text frame".to_string(),
            ));
        }
    };

    serde_json::from_str(&text)
        .map_err(|e| (CLOSE_INVALID_CONFIG, format!("invalid handshake: {e}")))
}

/// Open a transcription stream, reporting failure to the client as a
/// non-fatal error message.
async fn start_stream(
    api_key: &str,
    endpoint: &str,
    events_tx: &mpsc::Sender<SttEvent>,
    out_tx: &mpsc::Sender<OutgoingMessage>,
) -> Option<AssemblyAiStream> {
    let config = SttStreamConfig::new(api_key, endpoint);
    match AssemblyAiStream::start(config, events_tx.clone()).await {
        Ok(stream) => Some(stream),
        Err(e) => {
            error!("Failed to open transcription stream: {}", e);
            let _ = out_tx
                .send(OutgoingMessage::error(format!(
                    "transcription unavailable: {e}"
                )))
                .await;
            None
        }
    }
}

/// Drain the outbound queue into the socket.
///
/// A single failed send is logged but not fatal: only the read loop decides
/// when the connection is gone.
async fn run_sender(
    mut sink: SplitSink<WebSocket, Message>,
    mut out_rx: mpsc::Receiver<OutgoingMessage>,
) {
    while let Some(message) = out_rx.recv().await {
        let json = match serde_json::to_string(&message) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize outbound message: {}", e);
                continue;
            }
        };
        if let Err(e) = sink.send(Message::Text(json.into())).await {
            warn!("Outbound send failed: {}", e);
        }
    }
}

/// Consume transcription events and run the dispatch/synthesis pipeline.
///
/// Runs each final turn to completion before reading the next event, so
/// replies and audio clips keep per-session order.
async fn run_agent(
    mut session: Session,
    dispatcher: Dispatcher,
    synthesizer: BoxedSynthesizer,
    mut events_rx: mpsc::Receiver<SttEvent>,
    out_tx: mpsc::Sender<OutgoingMessage>,
) {
    while let Some(event) = events_rx.recv().await {
        match event {
            SttEvent::Begin { session_id } => {
                debug!("Transcription stream {} ready", session_id);
                let _ = out_tx.send(OutgoingMessage::status("listening")).await;
            }
            SttEvent::Turn { text, end_of_turn } => {
                if !end_of_turn {
                    let _ = out_tx.send(OutgoingMessage::Partial { text }).await;
                    continue;
                }
                if text.trim().is_empty() {
                    continue;
                }

                let _ = out_tx
                    .send(OutgoingMessage::Final { text: text.clone() })
                    .await;

                let reply = dispatcher.handle_turn(&mut session, &text).await;
                let _ = out_tx
                    .send(OutgoingMessage::Assistant {
                        text: reply.clone(),
                    })
                    .await;

                speak_reply(synthesizer.as_ref(), &reply, &out_tx).await;
            }
            SttEvent::Error(e) => {
                warn!("Transcription error: {}", e);
                let _ = out_tx
                    .send(OutgoingMessage::error(format!("transcription error: {e}")))
                    .await;
            }
            SttEvent::Terminated { audio_duration_ms } => {
                debug!(
                    "Transcription stream ended after {}ms of audio",
                    audio_duration_ms
                );
                let _ = out_tx.send(OutgoingMessage::status("stopped")).await;
            }
        }
    }
}
