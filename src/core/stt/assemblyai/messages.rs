//! Wire messages for the AssemblyAI Streaming API v3.
//!
//! Audio goes to the server as raw binary WebSocket frames; everything else
//! is JSON discriminated by a `type` field.

use serde::{Deserialize, Serialize};

use crate::core::stt::base::SttError;

/// Session established; carries the vendor-assigned session id.
#[derive(Debug, Clone, Deserialize)]
pub struct BeginMessage {
    pub id: String,
    #[serde(default)]
    pub expires_at: i64,
}

/// One transcript turn. With `format_turns` enabled, turns flagged
/// `end_of_turn` are immutable finalized utterances; anything else is a live
/// partial.
#[derive(Debug, Clone, Deserialize)]
pub struct TurnMessage {
    #[serde(default)]
    pub turn_order: u32,
    pub transcript: String,
    pub end_of_turn: bool,
    /// Set once the vendor has applied punctuation/casing to a final turn.
    #[serde(default)]
    pub turn_is_formatted: bool,
}

/// Session closed by the vendor.
#[derive(Debug, Clone, Deserialize)]
pub struct TerminationMessage {
    #[serde(default)]
    pub audio_duration_ms: u64,
    #[serde(default)]
    pub terminated_normally: bool,
}

/// Error report from the vendor.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorMessage {
    #[serde(default)]
    pub error_code: Option<String>,
    pub error: String,
}

impl ErrorMessage {
    /// Map the vendor error code onto the relay's error taxonomy.
    pub fn into_stt_error(self) -> SttError {
        match self.error_code.as_deref() {
            Some("invalid_api_key") | Some("authentication_failed") => {
                SttError::AuthenticationFailed(self.error)
            }
            Some("rate_limit_exceeded") | Some("rate_limit") => {
                SttError::ProviderError(format!("rate limit exceeded: {}", self.error))
            }
            Some("invalid_audio") | Some("audio_error") => SttError::InvalidAudio(self.error),
            _ => SttError::ProviderError(self.error),
        }
    }
}

/// Graceful session shutdown request.
#[derive(Debug, Clone, Serialize)]
pub struct TerminateMessage {
    #[serde(rename = "type")]
    pub message_type: &'static str,
}

impl Default for TerminateMessage {
    fn default() -> Self {
        Self {
            message_type: "Terminate",
        }
    }
}

/// All JSON messages the vendor can send.
#[derive(Debug)]
pub enum AssemblyAiMessage {
    Begin(BeginMessage),
    Turn(TurnMessage),
    Termination(TerminationMessage),
    Error(ErrorMessage),
    /// Unrecognized `type`, kept for forward compatibility.
    Unknown(String),
}

impl AssemblyAiMessage {
    /// Parse a raw JSON text frame by its `type` discriminator.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        #[derive(Deserialize)]
        struct Discriminator<'a> {
            #[serde(rename = "type")]
            message_type: &'a str,
        }

        let tag: Discriminator = serde_json::from_str(text)?;
        Ok(match tag.message_type {
            "Begin" => Self::Begin(serde_json::from_str(text)?),
            "Turn" => Self::Turn(serde_json::from_str(text)?),
            "Termination" => Self::Termination(serde_json::from_str(text)?),
            "Error" => Self::Error(serde_json::from_str(text)?),
            other => Self::Unknown(other.to_string()),
        })
    }
}
