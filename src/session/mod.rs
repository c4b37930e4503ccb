//! Per-connection session state.
//!
//! A [`Session`] is created when a client connects and dropped when the
//! connection closes. It owns the conversation history, the active persona,
//! and the vendor credentials supplied in the handshake. Nothing here is
//! persisted; process restart wipes all sessions.

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::core::llm::Persona;

/// Default cap on stored history entries (user + assistant turns combined).
///
/// History is replayed verbatim on every LLM call, so an unbounded log grows
/// both memory and vendor token usage without limit. When the cap is reached
/// the oldest user/assistant pair is dropped.
pub const DEFAULT_MAX_HISTORY_ENTRIES: usize = 100;

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Wire name used by the Gemini API ("user" / "model").
    pub fn as_gemini_role(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "model",
        }
    }
}

/// One immutable entry in the conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Vendor API keys scoped to a single session.
///
/// Supplied by the client in the WebSocket handshake, held in memory for the
/// lifetime of the connection, and zeroized on drop. These must never be
/// logged or persisted; the `Debug` impl redacts every field.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    pub assemblyai: String,
    pub murf: String,
    pub gemini: String,
    pub serpapi: Option<String>,
    pub weather: Option<String>,
}

impl Credentials {
    /// Names of required keys that are missing or empty, in a fixed order.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.assemblyai.is_empty() {
            missing.push("assemblyai");
        }
        if self.murf.is_empty() {
            missing.push("murf");
        }
        if self.gemini.is_empty() {
            missing.push("gemini");
        }
        missing
    }

    pub fn has_search(&self) -> bool {
        self.serpapi.as_deref().is_some_and(|k| !k.is_empty())
    }

    pub fn has_weather(&self) -> bool {
        self.weather.as_deref().is_some_and(|k| !k.is_empty())
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("assemblyai", &"<redacted>")
            .field("murf", &"<redacted>")
            .field("gemini", &"<redacted>")
            .field("serpapi", &self.serpapi.as_ref().map(|_| "<redacted>"))
            .field("weather", &self.weather.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// State owned by one client connection.
///
/// Replaces the global `chat_histories` map pattern: the connection handler
/// owns the session and passes it by reference through the dispatch chain, so
/// per-session lifetime is explicit and nothing leaks across connections.
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub persona: Persona,
    pub credentials: Credentials,
    history: Vec<Turn>,
    max_history_entries: usize,
}

impl Session {
    pub fn new(persona: Persona, credentials: Credentials) -> Self {
        Self::with_history_cap(persona, credentials, DEFAULT_MAX_HISTORY_ENTRIES)
    }

    pub fn with_history_cap(
        persona: Persona,
        credentials: Credentials,
        max_history_entries: usize,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            persona,
            credentials,
            history: Vec::new(),
            max_history_entries: max_history_entries.max(2),
        }
    }

    /// Conversation log in chronological order.
    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// Append one completed exchange. Entries are never mutated afterwards.
    ///
    /// The assistant text may be a fallback apology; a failed skill call still
    /// records both turns so the conversation stays consistent.
    pub fn record_exchange(&mut self, user_text: &str, assistant_text: &str) {
        self.history.push(Turn::user(user_text));
        self.history.push(Turn::assistant(assistant_text));

        // Trim oldest pairs once over the cap, keeping user/assistant pairing
        // intact so the replayed history always alternates correctly.
        while self.history.len() > self.max_history_entries {
            self.history.drain(..2);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials {
            assemblyai: "aai-key".into(),
            murf: "murf-key".into(),
            gemini: "gem-key".into(),
            serpapi: None,
            weather: None,
        }
    }

    #[test]
    fn test_history_grows_two_entries_per_turn() {
        let mut session = Session::new(Persona::default(), credentials());

        for n in 1..=5 {
            session.record_exchange("hello", "hi there");
            assert_eq!(session.history().len(), 2 * n);
        }

        // Strict chronological alternation.
        for (i, turn) in session.history().iter().enumerate() {
            let expected = if i % 2 == 0 { Role::User } else { Role::Assistant };
            assert_eq!(turn.role, expected);
        }
    }

    #[test]
    fn test_history_cap_drops_oldest_pair() {
        let mut session = Session::with_history_cap(Persona::default(), credentials(), 4);

        session.record_exchange("first", "one");
        session.record_exchange("second", "two");
        session.record_exchange("third", "three");

        assert_eq!(session.history().len(), 4);
        assert_eq!(session.history()[0].content, "second");
        assert_eq!(session.history()[3].content, "three");
    }

    #[test]
    fn test_missing_required_keys() {
        let creds = Credentials {
            assemblyai: String::new(),
            murf: "m".into(),
            gemini: String::new(),
            serpapi: None,
            weather: None,
        };
        assert_eq!(creds.missing_required(), vec!["assemblyai", "gemini"]);

        assert!(credentials().missing_required().is_empty());
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let mut creds = credentials();
        creds.serpapi = Some("serp-secret".into());
        let formatted = format!("{creds:?}");
        assert!(!formatted.contains("aai-key"));
        assert!(!formatted.contains("serp-secret"));
        assert!(formatted.contains("<redacted>"));
    }

    #[test]
    fn test_gemini_role_names() {
        assert_eq!(Role::User.as_gemini_role(), "user");
        assert_eq!(Role::Assistant.as_gemini_role(), "model");
    }
}
