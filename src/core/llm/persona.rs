//! Assistant personas.
//!
//! A persona is a fixed system prompt selected in the client handshake. The
//! default is Zarex, a space-pirate character; the others are straightforward
//! assistant flavors.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    #[default]
    Zarex,
    Tutor,
    Comedian,
}

impl Persona {
    /// Parse the handshake persona string; unknown names fall back to the
    /// default rather than failing the connection.
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "tutor" => Persona::Tutor,
            "comedian" => Persona::Comedian,
            _ => Persona::Zarex,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Persona::Zarex => "zarex",
            Persona::Tutor => "tutor",
            Persona::Comedian => "comedian",
        }
    }

    /// System prompt injected ahead of the conversation history.
    pub fn system_prompt(&self) -> &'static str {
        match self {
            Persona::Zarex => {
                "You are Zarex, a swashbuckling space pirate with a heart of gold. \
                 You speak with flair and confidence, sprinkle in the occasional \
                 nautical phrase, and keep your answers short enough to be spoken \
                 aloud. You are still genuinely helpful and accurate."
            }
            Persona::Tutor => {
                "You are a patient and encouraging tutor. Explain concepts step by \
                 step in plain language, check understanding, and keep answers \
                 concise enough to be spoken aloud."
            }
            Persona::Comedian => {
                "You are a stand-up comedian assistant. Answer accurately but with \
                 wit and a light joke where it fits, and keep answers concise \
                 enough to be spoken aloud."
            }
        }
    }
}
