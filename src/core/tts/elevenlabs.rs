//! ElevenLabs REST synthesis provider (alternative).
//!
//! Single round trip: the response body is the MP3 clip.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;

use super::base::{SpeechSynthesizer, TtsConfig, TtsError, TtsResult};

pub const ELEVENLABS_TTS_URL: &str = "https://api.elevenlabs.io";

/// "Rachel", the stock ElevenLabs voice.
pub const ELEVENLABS_DEFAULT_VOICE: &str = "21m00Tcm4TlvDq8ikWAM";

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

pub struct ElevenLabsTts {
    api_key: String,
    voice_id: String,
    endpoint: String,
    http: reqwest::Client,
}

impl ElevenLabsTts {
    pub fn new(config: TtsConfig, http: reqwest::Client) -> TtsResult<Self> {
        if config.api_key.is_empty() {
            return Err(TtsError::InvalidConfiguration(
                "ElevenLabs API key is required".to_string(),
            ));
        }
        Ok(Self {
            api_key: config.api_key,
            voice_id: config
                .voice_id
                .unwrap_or_else(|| ELEVENLABS_DEFAULT_VOICE.to_string()),
            endpoint: config
                .endpoint
                .unwrap_or_else(|| ELEVENLABS_TTS_URL.to_string()),
            http,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsTts {
    fn provider_name(&self) -> &'static str {
        "elevenlabs"
    }

    async fn synthesize(&self, text: &str) -> TtsResult<Bytes> {
        let url = format!(
            "{}/v1/text-to-speech/{}",
            self.endpoint.trim_end_matches('/'),
            self.voice_id
        );

        let response = self
            .http
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .header("Accept", "audio/mpeg")
            .json(&SynthesisRequest {
                text,
                model_id: "eleven_turbo_v2_5",
            })
            .send()
            .await
            .map_err(|e| TtsError::NetworkError(format!("ElevenLabs request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(TtsError::AuthenticationFailed(
                "ElevenLabs rejected the API key".to_string(),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TtsError::ProviderError(format!(
                "ElevenLabs returned {status}: {body}"
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| TtsError::NetworkError(format!("ElevenLabs body read failed: {e}")))
    }
}
