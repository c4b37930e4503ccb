//! Non-streaming AssemblyAI transcription (upload + poll).
//!
//! Used by the HTTP agent endpoint, where the full recording is available up
//! front and a WebSocket session would be overkill.

use std::time::Duration;

use bytes::Bytes;
use serde::Deserialize;
use tracing::debug;

use super::ASSEMBLYAI_API_URL;
use crate::core::stt::base::SttError;

/// Configuration for batch transcription.
#[derive(Debug, Clone)]
pub struct BatchTranscriberConfig {
    pub api_key: String,
    /// Base REST endpoint, overridable for tests.
    pub endpoint: String,
    /// Delay between status polls.
    pub poll_interval: Duration,
    /// Give up after this many polls.
    pub max_poll_attempts: u32,
}

impl BatchTranscriberConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: ASSEMBLYAI_API_URL.to_string(),
            poll_interval: Duration::from_secs(1),
            max_poll_attempts: 60,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    upload_url: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptResponse {
    id: String,
    status: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Upload-and-poll transcription client.
pub struct BatchTranscriber {
    config: BatchTranscriberConfig,
    http: reqwest::Client,
}

impl BatchTranscriber {
    pub fn new(config: BatchTranscriberConfig, http: reqwest::Client) -> Result<Self, SttError> {
        if config.api_key.is_empty() {
            return Err(SttError::AuthenticationFailed(
                "API key is required for AssemblyAI transcription".to_string(),
            ));
        }
        Ok(Self { config, http })
    }

    /// Transcribe one complete audio recording.
    ///
    /// Uploads the bytes, submits a transcript job, then polls until the job
    /// completes or the attempt budget runs out.
    pub async fn transcribe(&self, audio: Bytes) -> Result<String, SttError> {
        let upload_url = self.upload(audio).await?;
        let transcript_id = self.submit(&upload_url).await?;
        self.poll(&transcript_id).await
    }

    async fn upload(&self, audio: Bytes) -> Result<String, SttError> {
        let url = format!("{}/v2/upload", self.config.endpoint.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .header("Authorization", &self.config.api_key)
            .header("Content-Type", "application/octet-stream")
            .body(audio)
            .send()
            .await
            .map_err(|e| SttError::NetworkError(format!("upload request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(status_error("upload", response).await);
        }

        let parsed: UploadResponse = response
            .json()
            .await
            .map_err(|e| SttError::ProviderError(format!("invalid upload response: {e}")))?;
        Ok(parsed.upload_url)
    }

    async fn submit(&self, audio_url: &str) -> Result<String, SttError> {
        let url = format!(
            "{}/v2/transcript",
            self.config.endpoint.trim_end_matches('/')
        );
        let response = self
            .http
            .post(&url)
            .header("Authorization", &self.config.api_key)
            .json(&serde_json::json!({ "audio_url": audio_url }))
            .send()
            .await
            .map_err(|e| SttError::NetworkError(format!("transcript request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(status_error("transcript submit", response).await);
        }

        let parsed: TranscriptResponse = response
            .json()
            .await
            .map_err(|e| SttError::ProviderError(format!("invalid transcript response: {e}")))?;
        Ok(parsed.id)
    }

    async fn poll(&self, transcript_id: &str) -> Result<String, SttError> {
        let url = format!(
            "{}/v2/transcript/{transcript_id}",
            self.config.endpoint.trim_end_matches('/')
        );

        for attempt in 0..self.config.max_poll_attempts {
            let response = self
                .http
                .get(&url)
                .header("Authorization", &self.config.api_key)
                .send()
                .await
                .map_err(|e| SttError::NetworkError(format!("poll request failed: {e}")))?;

            if !response.status().is_success() {
                return Err(status_error("transcript poll", response).await);
            }

            let parsed: TranscriptResponse = response
                .json()
                .await
                .map_err(|e| SttError::ProviderError(format!("invalid poll response: {e}")))?;

            debug!(
                "Transcript {} status: {} (attempt {})",
                parsed.id, parsed.status, attempt
            );

            match parsed.status.as_str() {
                "completed" => return Ok(parsed.text.unwrap_or_default()),
                "error" => {
                    return Err(SttError::ProviderError(
                        parsed
                            .error
                            .unwrap_or_else(|| "transcription failed".to_string()),
                    ));
                }
                _ => tokio::time::sleep(self.config.poll_interval).await,
            }
        }

        Err(SttError::ProviderError(format!(
            "transcript {transcript_id} did not complete within {} polls",
            self.config.max_poll_attempts
        )))
    }
}

async fn status_error(operation: &str, response: reqwest::Response) -> SttError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        SttError::AuthenticationFailed(format!("{operation} rejected: {body}"))
    } else {
        SttError::ProviderError(format!("{operation} returned {status}: {body}"))
    }
}
