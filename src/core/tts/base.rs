//! Shared types for the speech synthesis relay.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Errors from a synthesis provider.
#[derive(Debug, Error)]
pub enum TtsError {
    #[error("TTS authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("TTS network error: {0}")]
    NetworkError(String),

    #[error("TTS provider error: {0}")]
    ProviderError(String),

    #[error("TTS configuration error: {0}")]
    InvalidConfiguration(String),
}

pub type TtsResult<T> = Result<T, TtsError>;

/// Configuration shared by all synthesis providers.
#[derive(Debug, Clone)]
pub struct TtsConfig {
    pub api_key: String,
    /// Provider voice identifier. Each provider falls back to its own default
    /// when unset.
    pub voice_id: Option<String>,
    /// Base REST endpoint override, for tests.
    pub endpoint: Option<String>,
}

impl TtsConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            voice_id: None,
            endpoint: None,
        }
    }

    pub fn with_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = Some(voice_id.into());
        self
    }
}

/// One-shot text-to-audio synthesis.
///
/// Implementations return a complete encoded clip (MP3). Streaming synthesis
/// is not part of this interface; the session layer achieves incremental
/// playback by splitting replies into sentences and synthesizing them in
/// order.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Provider name, as accepted by the factory.
    fn provider_name(&self) -> &'static str;

    /// Synthesize `text` and return the encoded audio bytes.
    async fn synthesize(&self, text: &str) -> TtsResult<Bytes>;
}

pub type BoxedSynthesizer = Box<dyn SpeechSynthesizer>;
