//! Client-facing WebSocket protocol.
//!
//! The first client frame is the handshake; after that, binary frames carry
//! audio and a handful of text commands control the stream. Everything the
//! server sends is JSON tagged by `type`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::session::Credentials;

/// Close code for a handshake missing required credentials (policy
/// violation).
pub const CLOSE_MISSING_KEYS: u16 = 1008;

/// Close code for a malformed handshake (unsupported data).
pub const CLOSE_INVALID_CONFIG: u16 = 1003;

/// First message a client must send after the socket upgrade.
#[derive(Debug, Deserialize)]
pub struct Handshake {
    #[serde(default)]
    pub keys: HandshakeKeys,
    #[serde(default)]
    pub persona: Option<String>,
    #[serde(default)]
    pub voice_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HandshakeKeys {
    #[serde(default)]
    pub assemblyai: Option<String>,
    #[serde(default)]
    pub murf: Option<String>,
    #[serde(default)]
    pub gemini: Option<String>,
    #[serde(default)]
    pub serpapi: Option<String>,
    #[serde(default)]
    pub weather: Option<String>,
}

impl HandshakeKeys {
    pub fn into_credentials(self) -> Credentials {
        Credentials {
            assemblyai: self.assemblyai.unwrap_or_default(),
            murf: self.murf.unwrap_or_default(),
            gemini: self.gemini.unwrap_or_default(),
            serpapi: self.serpapi.filter(|k| !k.is_empty()),
            weather: self.weather.filter(|k| !k.is_empty()),
        }
    }
}

/// Text commands a client may send after the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCommand {
    /// (Re)start the transcription stream.
    Start,
    /// End the audio stream.
    Stop,
    /// Anything else; logged and ignored.
    Unknown,
}

impl ClientCommand {
    pub fn parse(text: &str) -> Self {
        match text.trim() {
            "start" => ClientCommand::Start,
            "stop" | "EOF" => ClientCommand::Stop,
            _ => ClientCommand::Unknown,
        }
    }
}

/// Server-to-client messages.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutgoingMessage {
    /// Lifecycle notices ("connected", "listening", "stopped").
    Status { message: String },
    /// Live partial transcript; superseded by later partials or a final.
    Partial { text: String },
    /// Finalized utterance, about to be dispatched.
    Final { text: String },
    /// Assistant reply text for the last final transcript.
    Assistant { text: String },
    /// One synthesized audio clip, base64 MP3. Clips arrive in sentence
    /// order.
    Audio { b64: String },
    /// Non-fatal error notice; the connection stays open.
    Error { message: String },
}

impl OutgoingMessage {
    pub fn status(message: impl Into<String>) -> Self {
        OutgoingMessage::Status {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        OutgoingMessage::Error {
            message: message.into(),
        }
    }

    pub fn audio(clip: &[u8]) -> Self {
        OutgoingMessage::Audio {
            b64: BASE64.encode(clip),
        }
    }
}
