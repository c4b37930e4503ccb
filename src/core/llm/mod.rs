//! Google Gemini chat client.
//!
//! Single REST call per turn: the whole conversation history is replayed as
//! `contents`, with the persona prompt as `system_instruction`.

pub mod persona;

pub use persona::Persona;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::session::Turn;

pub const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com";

/// Model used for all chat completions.
pub const GEMINI_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("LLM network error: {0}")]
    NetworkError(String),

    #[error("LLM provider error: {0}")]
    ProviderError(String),

    #[error("LLM returned no candidates")]
    EmptyResponse,

    #[error("LLM configuration error: {0}")]
    InvalidConfiguration(String),
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction<'a>>,
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

pub struct GeminiClient {
    api_key: String,
    endpoint: String,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        endpoint: Option<String>,
        http: reqwest::Client,
    ) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(LlmError::InvalidConfiguration(
                "Gemini API key is required".to_string(),
            ));
        }
        Ok(Self {
            api_key,
            endpoint: endpoint.unwrap_or_else(|| GEMINI_API_URL.to_string()),
            http,
        })
    }

    /// Run one chat completion over the session history plus the new user
    /// message, under the given system prompt.
    pub async fn chat(
        &self,
        system_prompt: &str,
        history: &[Turn],
        user_message: &str,
    ) -> Result<String, LlmError> {
        let mut contents: Vec<Content> = history
            .iter()
            .map(|turn| Content {
                role: turn.role.as_gemini_role(),
                parts: vec![Part {
                    text: &turn.content,
                }],
            })
            .collect();
        contents.push(Content {
            role: "user",
            parts: vec![Part { text: user_message }],
        });

        let request = GenerateRequest {
            system_instruction: (!system_prompt.is_empty()).then(|| SystemInstruction {
                parts: vec![Part {
                    text: system_prompt,
                }],
            }),
            contents,
        };

        let url = format!(
            "{}/v1beta/models/{GEMINI_MODEL}:generateContent",
            self.endpoint.trim_end_matches('/')
        );

        debug!("Calling Gemini with {} history turns", history.len());

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(format!("Gemini request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(LlmError::AuthenticationFailed(
                "Gemini rejected the API key".to_string(),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::ProviderError(format!(
                "Gemini returned {status}: {body}"
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ProviderError(format!("invalid Gemini response: {e}")))?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(text)
    }
}
