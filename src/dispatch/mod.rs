//! Turn dispatch: routes a finalized transcript to a skill and produces the
//! assistant reply.
//!
//! Routing is a fixed keyword rule table, checked in priority order. There is
//! no intent classifier; the rules are deliberately dumb and predictable, and
//! a transcript matching several rules goes to the highest-priority one.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{error, info, warn};

use crate::core::llm::{GeminiClient, LlmError};
use crate::core::search::SerpApiClient;
use crate::core::weather::WeatherClient;
use crate::session::Session;

/// Spoken apology when the weather skill fails for any reason.
pub const WEATHER_FALLBACK: &str =
    "Sorry, I couldn't fetch the weather information at the moment.";

/// Spoken apology when the LLM call fails.
pub const LLM_FALLBACK: &str =
    "I'm sorry, I encountered an error while processing your request.";

/// Spoken apology when the web search call fails.
pub const SEARCH_FALLBACK: &str =
    "I'm sorry, I encountered an error while searching the web.";

/// Spoken reply when the web search succeeds but finds nothing.
pub const SEARCH_EMPTY: &str =
    "I couldn't find any relevant information on the web for that.";

/// Keywords that route a turn to the weather skill.
const WEATHER_KEYWORDS: &[&str] = &["weather", "temperature", "forecast", "mausam"];

/// Phrases that route a turn to the web search skill.
const SEARCH_TRIGGERS: &[&str] = &["search for", "what is"];

/// The skill chosen for a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skill {
    Weather,
    Search,
    Chat,
}

/// Pick the skill for a transcript. Priority: weather beats search beats
/// plain chat. Search only triggers when a search credential is available;
/// without one the phrase falls through to the LLM, which can usually answer
/// "what is" questions on its own.
pub fn select_skill(text: &str, has_search: bool) -> Skill {
    let lowered = text.to_lowercase();

    if WEATHER_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
        return Skill::Weather;
    }
    if has_search && SEARCH_TRIGGERS.iter().any(|t| lowered.contains(t)) {
        return Skill::Search;
    }
    Skill::Chat
}

/// Heuristic location extraction for weather queries.
///
/// The token after the last "in" wins ("weather in Mumbai" -> "mumbai");
/// otherwise the last word of the query; otherwise a literal
/// "current location". Lowercased with punctuation trimmed.
pub fn extract_location(text: &str) -> String {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();

    let candidate = words
        .iter()
        .rposition(|w| *w == "in")
        .and_then(|idx| words.get(idx + 1).copied())
        .or_else(|| words.last().copied());

    let location = candidate
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .unwrap_or_default();

    if location.is_empty() {
        "current location".to_string()
    } else {
        location
    }
}

/// Per-session skill clients, built from the handshake credentials.
///
/// Optional vendors stay `None` when the client supplied no key; the rule
/// table accounts for that, so a missing SerpAPI key simply disables the
/// search trigger.
pub struct Dispatcher {
    llm: GeminiClient,
    search: Option<SerpApiClient>,
    weather: Option<WeatherClient>,
}

impl Dispatcher {
    pub fn new(
        llm: GeminiClient,
        search: Option<SerpApiClient>,
        weather: Option<WeatherClient>,
    ) -> Self {
        Self {
            llm,
            search,
            weather,
        }
    }

    /// Dispatch one finalized transcript and return the assistant reply.
    ///
    /// Always returns text and always records the exchange on the session,
    /// including the fallback apology when a skill fails. The caller never
    /// has to handle a dispatch error.
    pub async fn handle_turn(&self, session: &mut Session, transcript: &str) -> String {
        let skill = select_skill(transcript, self.search.is_some());
        info!(skill = ?skill, "Dispatching turn");

        let reply = match skill {
            Skill::Weather => self.weather_reply(transcript).await,
            Skill::Search => self.search_reply(session, transcript).await,
            Skill::Chat => self.chat_reply(session, transcript).await,
        };

        session.record_exchange(transcript, &reply);
        reply
    }

    async fn weather_reply(&self, transcript: &str) -> String {
        let Some(weather) = &self.weather else {
            warn!("Weather skill selected but no weather credential supplied");
            return WEATHER_FALLBACK.to_string();
        };

        let location = extract_location(transcript);
        match weather.current(&location).await {
            Ok(current) => current.summary(),
            Err(e) => {
                error!("Weather lookup for '{}' failed: {}", location, e);
                WEATHER_FALLBACK.to_string()
            }
        }
    }

    async fn search_reply(&self, session: &Session, transcript: &str) -> String {
        let Some(search) = &self.search else {
            // select_skill never picks Search without a client; fall through
            // to plain chat rather than apologize.
            return self.chat_reply(session, transcript).await;
        };

        let query = strip_search_prefix(transcript);
        match search.search(query).await {
            Ok(Some(context)) => {
                let grounded = format!(
                    "Using the following web search results, answer the user's question. \
                     Keep the answer short and speakable.\n\nSearch results:\n{context}\n\n\
                     Question: {transcript}"
                );
                match self
                    .llm
                    .chat(session.persona.system_prompt(), session.history(), &grounded)
                    .await
                {
                    Ok(reply) => reply,
                    Err(e) => {
                        error!("LLM call over search results failed: {}", e);
                        SEARCH_FALLBACK.to_string()
                    }
                }
            }
            Ok(None) => SEARCH_EMPTY.to_string(),
            Err(e) => {
                error!("Web search failed: {}", e);
                SEARCH_FALLBACK.to_string()
            }
        }
    }

    async fn chat_reply(&self, session: &Session, transcript: &str) -> String {
        match self
            .llm
            .chat(session.persona.system_prompt(), session.history(), transcript)
            .await
        {
            Ok(reply) => reply,
            Err(LlmError::EmptyResponse) => {
                warn!("Gemini returned an empty reply");
                LLM_FALLBACK.to_string()
            }
            Err(e) => {
                error!("LLM call failed: {}", e);
                LLM_FALLBACK.to_string()
            }
        }
    }
}

static SEARCH_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^search\s+for\b").expect("search prefix regex is valid"));

/// Drop a leading "search for" so the query sent to the engine is the actual
/// subject.
///
/// Matched case-insensitively on the original string, so the returned slice
/// offsets are always valid char boundaries regardless of how case folding
/// would change byte lengths.
fn strip_search_prefix(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(found) = SEARCH_PREFIX.find(trimmed) {
        let rest = trimmed[found.end()..].trim_start();
        if !rest.is_empty() {
            return rest;
        }
    }
    trimmed
}
