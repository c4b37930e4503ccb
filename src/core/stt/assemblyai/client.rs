//! AssemblyAI streaming transcription client.
//!
//! Wraps one WebSocket session to the AssemblyAI Streaming API v3. Audio is
//! forwarded as raw binary frames (no base64); transcripts come back as JSON
//! turns. The vendor-facing task pushes typed [`SttEvent`]s onto the channel
//! supplied at [`AssemblyAiStream::start`], so consumers see one ordered
//! queue instead of per-event callbacks.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::{RwLock, mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::client::generate_key;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, error, info, warn};

use super::messages::{AssemblyAiMessage, TerminateMessage};
use crate::core::stt::base::{SttError, SttEvent, SttStreamConfig};

/// Maximum audio chunk size in bytes (sanity check).
///
/// The vendor recommends ~50ms of audio per message. At 16kHz mono 16-bit
/// PCM one second is ~32KB, so 256KB is several seconds and well past any
/// legitimate frame a browser client would send.
const MAX_AUDIO_CHUNK_SIZE: usize = 256 * 1024;

/// Per-message idle timeout for the vendor connection. Resets on each
/// received message; catches stuck/dead connections.
const WS_MESSAGE_TIMEOUT: Duration = Duration::from_secs(60);

/// How long to wait for the vendor's Begin message before giving up.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How long to wait for the vendor task to drain on shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to an active streaming transcription session.
///
/// There is at most one of these per client session. Dropping the handle
/// signals shutdown as a backstop, but [`AssemblyAiStream::stop`] should be
/// called for a graceful vendor-side terminate.
pub struct AssemblyAiStream {
    audio_tx: mpsc::Sender<Bytes>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
    session_id: Arc<RwLock<Option<String>>>,
    connected: Arc<AtomicBool>,
}

impl AssemblyAiStream {
    /// Open a vendor stream and begin emitting events on `events`.
    ///
    /// Resolves once the vendor acknowledges the session (Begin message) or
    /// the connect timeout elapses.
    pub async fn start(
        config: SttStreamConfig,
        events: mpsc::Sender<SttEvent>,
    ) -> Result<Self, SttError> {
        if config.api_key.is_empty() {
            return Err(SttError::AuthenticationFailed(
                "API key is required for AssemblyAI streaming".to_string(),
            ));
        }

        let ws_url = build_websocket_url(&config)?;
        let host = url::Url::parse(&ws_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_owned))
            .ok_or_else(|| {
                SttError::ConfigurationError(format!("invalid STT endpoint: {}", config.endpoint))
            })?;

        // Bounded audio channel gives backpressure toward the socket reader.
        let (audio_tx, mut audio_rx) = mpsc::channel::<Bytes>(32);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let (connected_tx, connected_rx) = oneshot::channel::<()>();

        let session_id = Arc::new(RwLock::new(None::<String>));
        let connected = Arc::new(AtomicBool::new(false));

        let task_session_id = session_id.clone();
        let task_connected = connected.clone();
        let api_key = config.api_key.clone();

        let task = tokio::spawn(async move {
            // AssemblyAI authenticates WebSocket upgrades with the raw key in
            // the Authorization header (no Bearer prefix).
            let request = match tokio_tungstenite::tungstenite::http::Request::builder()
                .method("GET")
                .uri(&ws_url)
                .header("Host", host)
                .header("Upgrade", "websocket")
                .header("Connection", "upgrade")
                .header("Sec-WebSocket-Key", generate_key())
                .header("Sec-WebSocket-Version", "13")
                .header("Authorization", &api_key)
                .body(())
            {
                Ok(request) => request,
                Err(e) => {
                    let _ = events
                        .send(SttEvent::Error(SttError::ConnectionFailed(format!(
                            "failed to build WebSocket request: {e}"
                        ))))
                        .await;
                    return;
                }
            };

            let (ws_stream, _response) = match connect_async(request).await {
                Ok(pair) => pair,
                Err(e) => {
                    let _ = events
                        .send(SttEvent::Error(SttError::ConnectionFailed(format!(
                            "failed to connect to AssemblyAI: {e}"
                        ))))
                        .await;
                    return;
                }
            };

            info!("Connected to AssemblyAI streaming endpoint");
            let (mut ws_sink, mut ws_stream) = ws_stream.split();
            let mut connected_tx = Some(connected_tx);

            loop {
                tokio::select! {
                    // Outgoing audio, forwarded verbatim as binary frames.
                    Some(chunk) = audio_rx.recv() => {
                        let len = chunk.len();
                        if let Err(e) = ws_sink.send(Message::Binary(chunk)).await {
                            let _ = events
                                .send(SttEvent::Error(SttError::NetworkError(format!(
                                    "failed to send audio: {e}"
                                ))))
                                .await;
                            task_connected.store(false, Ordering::Release);
                            break;
                        }
                        debug!("Sent {} bytes of audio to AssemblyAI", len);
                    }

                    // Incoming vendor messages, with an idle timeout.
                    message = timeout(WS_MESSAGE_TIMEOUT, ws_stream.next()) => {
                        match message {
                            Ok(Some(Ok(msg))) => {
                                match handle_vendor_message(msg, &events, &task_session_id).await {
                                    Ok(true) => {
                                        if task_session_id.read().await.is_some()
                                            && let Some(tx) = connected_tx.take()
                                        {
                                            task_connected.store(true, Ordering::Release);
                                            let _ = tx.send(());
                                        }
                                    }
                                    Ok(false) => {
                                        info!("AssemblyAI session ended");
                                        task_connected.store(false, Ordering::Release);
                                        break;
                                    }
                                    Err(e) => {
                                        error!("AssemblyAI streaming error: {}", e);
                                        let _ = events.send(SttEvent::Error(e)).await;
                                        task_connected.store(false, Ordering::Release);
                                        break;
                                    }
                                }
                            }
                            Ok(Some(Err(e))) => {
                                let _ = events
                                    .send(SttEvent::Error(SttError::NetworkError(format!(
                                        "WebSocket error: {e}"
                                    ))))
                                    .await;
                                task_connected.store(false, Ordering::Release);
                                break;
                            }
                            Ok(None) => {
                                info!("AssemblyAI stream closed by vendor");
                                task_connected.store(false, Ordering::Release);
                                break;
                            }
                            Err(_elapsed) => {
                                let _ = events
                                    .send(SttEvent::Error(SttError::NetworkError(
                                        "vendor connection idle timeout".to_string(),
                                    )))
                                    .await;
                                task_connected.store(false, Ordering::Release);
                                break;
                            }
                        }
                    }

                    // Graceful shutdown from stop()/Drop.
                    _ = &mut shutdown_rx => {
                        debug!("Shutting down AssemblyAI stream");
                        if let Ok(json) = serde_json::to_string(&TerminateMessage::default()) {
                            let _ = ws_sink.send(Message::Text(json.into())).await;
                        }
                        let _ = ws_sink.send(Message::Close(None)).await;
                        task_connected.store(false, Ordering::Release);
                        break;
                    }
                }
            }

            info!("AssemblyAI connection task finished");
        });

        // Wait for the Begin message before handing the stream out, so feed()
        // never races an unestablished session.
        match timeout(CONNECT_TIMEOUT, connected_rx).await {
            Ok(Ok(())) => Ok(Self {
                audio_tx,
                shutdown_tx: Some(shutdown_tx),
                task: Some(task),
                session_id,
                connected,
            }),
            Ok(Err(_)) => {
                task.abort();
                Err(SttError::ConnectionFailed(
                    "connection closed before session started".to_string(),
                ))
            }
            Err(_) => {
                task.abort();
                Err(SttError::ConnectionFailed(
                    "timed out waiting for session start".to_string(),
                ))
            }
        }
    }

    /// Whether the vendor session is established and accepting audio.
    pub fn is_active(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Vendor-assigned session id, once the session has begun.
    pub async fn session_id(&self) -> Option<String> {
        self.session_id.read().await.clone()
    }

    /// Forward one audio frame. Fire-and-forget beyond the bounded queue;
    /// backpressure past that is the vendor connection's responsibility.
    pub async fn feed(&self, chunk: Bytes) -> Result<(), SttError> {
        if !self.is_active() {
            return Err(SttError::ConnectionFailed(
                "not connected to AssemblyAI".to_string(),
            ));
        }

        if chunk.len() > MAX_AUDIO_CHUNK_SIZE {
            return Err(SttError::InvalidAudio(format!(
                "audio chunk of {} bytes exceeds maximum {} bytes",
                chunk.len(),
                MAX_AUDIO_CHUNK_SIZE
            )));
        }

        self.audio_tx
            .send(chunk)
            .await
            .map_err(|e| SttError::NetworkError(format!("failed to queue audio: {e}")))
    }

    /// Gracefully terminate the vendor session and release the task.
    pub async fn stop(mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(task) = self.task.take()
            && timeout(SHUTDOWN_TIMEOUT, task).await.is_err()
        {
            warn!("AssemblyAI connection task did not stop in time");
        }
    }
}

impl Drop for AssemblyAiStream {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
    }
}

/// Translate one vendor WebSocket message into events.
///
/// Returns `Ok(true)` to keep the connection open, `Ok(false)` on normal
/// termination, `Err` on a vendor-reported failure.
async fn handle_vendor_message(
    message: Message,
    events: &mpsc::Sender<SttEvent>,
    session_id: &Arc<RwLock<Option<String>>>,
) -> Result<bool, SttError> {
    match message {
        Message::Text(text) => {
            debug!("AssemblyAI message: {}", text);
            match AssemblyAiMessage::parse(&text) {
                Ok(AssemblyAiMessage::Begin(begin)) => {
                    info!("AssemblyAI session started: {}", begin.id);
                    *session_id.write().await = Some(begin.id.clone());
                    let _ = events
                        .send(SttEvent::Begin {
                            session_id: begin.id,
                        })
                        .await;
                }
                Ok(AssemblyAiMessage::Turn(turn)) => {
                    let _ = events
                        .send(SttEvent::Turn {
                            text: turn.transcript,
                            end_of_turn: turn.end_of_turn,
                        })
                        .await;
                }
                Ok(AssemblyAiMessage::Termination(term)) => {
                    info!(
                        "AssemblyAI session terminated (duration: {}ms, normal: {})",
                        term.audio_duration_ms, term.terminated_normally
                    );
                    let _ = events
                        .send(SttEvent::Terminated {
                            audio_duration_ms: term.audio_duration_ms,
                        })
                        .await;
                    return Ok(false);
                }
                Ok(AssemblyAiMessage::Error(err)) => {
                    return Err(err.into_stt_error());
                }
                Ok(AssemblyAiMessage::Unknown(tag)) => {
                    debug!("Unknown AssemblyAI message type: {}", tag);
                }
                Err(e) => {
                    warn!("Failed to parse AssemblyAI message: {}", e);
                }
            }
        }
        Message::Close(frame) => {
            info!("AssemblyAI WebSocket closed: {:?}", frame);
            return Ok(false);
        }
        Message::Ping(_) | Message::Pong(_) => {}
        Message::Binary(_) => {
            debug!("Unexpected binary message from AssemblyAI");
        }
        _ => {}
    }
    Ok(true)
}

/// Build the streaming URL from the configured endpoint.
fn build_websocket_url(config: &SttStreamConfig) -> Result<String, SttError> {
    let base = config.endpoint.trim_end_matches('/');
    let mut url = url::Url::parse(&format!("{base}/v3/ws")).map_err(|e| {
        SttError::ConfigurationError(format!("invalid STT endpoint {}: {e}", config.endpoint))
    })?;
    url.query_pairs_mut()
        .append_pair("sample_rate", &config.sample_rate.to_string())
        .append_pair("encoding", "pcm_s16le")
        .append_pair(
            "format_turns",
            if config.format_turns { "true" } else { "false" },
        );
    Ok(url.into())
}
