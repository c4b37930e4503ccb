pub mod llm;
pub mod search;
pub mod stt;
pub mod tts;
pub mod weather;
