//! Murf REST synthesis provider (primary).
//!
//! Two-step API: a generate call returns a JSON body with a URL to the
//! rendered clip, then the clip is downloaded separately.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::base::{SpeechSynthesizer, TtsConfig, TtsError, TtsResult};

pub const MURF_TTS_URL: &str = "https://api.murf.ai";

/// Default Murf voice when the client does not pick one.
pub const MURF_DEFAULT_VOICE: &str = "en-US-natalie";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    text: &'a str,
    voice_id: &'a str,
    format: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    audio_file: String,
}

pub struct MurfTts {
    api_key: String,
    voice_id: String,
    endpoint: String,
    http: reqwest::Client,
}

impl MurfTts {
    pub fn new(config: TtsConfig, http: reqwest::Client) -> TtsResult<Self> {
        if config.api_key.is_empty() {
            return Err(TtsError::InvalidConfiguration(
                "Murf API key is required".to_string(),
            ));
        }
        Ok(Self {
            api_key: config.api_key,
            voice_id: config
                .voice_id
                .unwrap_or_else(|| MURF_DEFAULT_VOICE.to_string()),
            endpoint: config.endpoint.unwrap_or_else(|| MURF_TTS_URL.to_string()),
            http,
        })
    }
}

impl MurfTts {
    /// Render a clip and return the vendor URL it is hosted at, without
    /// downloading the audio. The HTTP agent endpoint hands this URL straight
    /// to its caller.
    pub async fn generate_url(&self, text: &str) -> TtsResult<String> {
        let url = format!(
            "{}/v1/speech/generate",
            self.endpoint.trim_end_matches('/')
        );
        let request = GenerateRequest {
            text,
            voice_id: &self.voice_id,
            format: "MP3",
        };

        let response = self
            .http
            .post(&url)
            .header("api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| TtsError::NetworkError(format!("Murf request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(TtsError::AuthenticationFailed(
                "Murf rejected the API key".to_string(),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TtsError::ProviderError(format!(
                "Murf returned {status}: {body}"
            )));
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| TtsError::ProviderError(format!("invalid Murf response: {e}")))?;

        debug!("Murf rendered clip at {}", generated.audio_file);
        Ok(generated.audio_file)
    }
}

#[async_trait]
impl SpeechSynthesizer for MurfTts {
    fn provider_name(&self) -> &'static str {
        "murf"
    }

    async fn synthesize(&self, text: &str) -> TtsResult<Bytes> {
        let clip_url = self.generate_url(text).await?;

        // Second round trip for the actual audio bytes.
        let audio = self
            .http
            .get(&clip_url)
            .send()
            .await
            .map_err(|e| TtsError::NetworkError(format!("Murf audio download failed: {e}")))?;

        if !audio.status().is_success() {
            return Err(TtsError::ProviderError(format!(
                "Murf audio download returned {}",
                audio.status()
            )));
        }

        audio
            .bytes()
            .await
            .map_err(|e| TtsError::NetworkError(format!("Murf audio body read failed: {e}")))
    }
}
