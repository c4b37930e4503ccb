mod base;
pub mod elevenlabs;
pub mod murf;

pub use base::{BoxedSynthesizer, SpeechSynthesizer, TtsConfig, TtsError, TtsResult};
pub use elevenlabs::{ELEVENLABS_DEFAULT_VOICE, ELEVENLABS_TTS_URL, ElevenLabsTts};
pub use murf::{MURF_DEFAULT_VOICE, MURF_TTS_URL, MurfTts};

use once_cell::sync::Lazy;
use regex::Regex;

/// Factory for a synthesis provider by name.
///
/// Supported providers:
/// - `"murf"` - Murf REST API (default)
/// - `"elevenlabs"` - ElevenLabs REST API
pub fn create_synthesizer(
    provider_type: &str,
    config: TtsConfig,
    http: reqwest::Client,
) -> TtsResult<BoxedSynthesizer> {
    match provider_type.to_lowercase().as_str() {
        "murf" => Ok(Box::new(MurfTts::new(config, http)?)),
        "elevenlabs" | "eleven-labs" | "eleven_labs" => {
            Ok(Box::new(ElevenLabsTts::new(config, http)?))
        }
        _ => Err(TtsError::InvalidConfiguration(format!(
            "Unsupported TTS provider: {provider_type}. Supported providers: murf, elevenlabs"
        ))),
    }
}

static SENTENCE_BOUNDARY: Lazy<Regex> = Lazy::new(|| {
    // Terminator run followed by whitespace ends a sentence. A trailing
    // terminator with no whitespace after it closes the final sentence.
    Regex::new(r"[.?!]+\s+").expect("sentence boundary regex is valid")
});

/// Split reply text into sentences for sequential synthesis.
///
/// Boundaries are `.`, `?` or `!` followed by whitespace; the punctuation
/// stays attached to its sentence. Empty fragments are dropped, so
/// consecutive terminators or leading whitespace never yield blank synthesis
/// calls.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut last = 0;

    for boundary in SENTENCE_BOUNDARY.find_iter(text) {
        let sentence = text[last..boundary.start()].trim();
        let terminators = text[boundary.start()..boundary.end()].trim_end();
        if !sentence.is_empty() {
            sentences.push(format!("{sentence}{terminators}"));
        }
        last = boundary.end();
    }

    let tail = text[last..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }

    sentences
}
