//! Shared types for the speech-to-text relay.

use thiserror::Error;

/// Audio sample rate the gateway streams to the recognition vendor.
pub const SAMPLE_RATE: u32 = 16_000;

/// Channel count for streamed audio (mono).
pub const CHANNELS: u16 = 1;

/// Errors from the transcription relay.
#[derive(Debug, Error, Clone)]
pub enum SttError {
    #[error("STT authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("STT connection failed: {0}")]
    ConnectionFailed(String),

    #[error("STT network error: {0}")]
    NetworkError(String),

    #[error("invalid audio: {0}")]
    InvalidAudio(String),

    #[error("STT provider error: {0}")]
    ProviderError(String),

    #[error("STT configuration error: {0}")]
    ConfigurationError(String),
}

/// Typed events emitted by a streaming transcription session.
///
/// The vendor-facing task pushes these onto an `mpsc` channel supplied by the
/// caller; the session's event loop consumes them in order. This replaces the
/// registered-callback pattern of the vendor SDKs with a single queue, so
/// event ordering is the channel's ordering.
#[derive(Debug, Clone)]
pub enum SttEvent {
    /// Vendor session opened.
    Begin { session_id: String },

    /// A transcript turn. `end_of_turn` marks a finalized utterance; anything
    /// else is a live partial that must never trigger skill dispatch.
    Turn { text: String, end_of_turn: bool },

    /// Non-fatal vendor error. The stream is dead; the client must request a
    /// new one explicitly (no automatic reconnection).
    Error(SttError),

    /// Vendor closed the session.
    Terminated { audio_duration_ms: u64 },
}

/// Configuration for one streaming transcription session.
#[derive(Debug, Clone)]
pub struct SttStreamConfig {
    pub api_key: String,
    /// Base WebSocket endpoint, e.g. `wss://streaming.assemblyai.com`.
    /// Overridable so tests can point at a local stub server.
    pub endpoint: String,
    pub sample_rate: u32,
    /// Ask the vendor to return formatted, immutable final turns.
    pub format_turns: bool,
}

impl SttStreamConfig {
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            sample_rate: SAMPLE_RATE,
            format_turns: true,
        }
    }
}
