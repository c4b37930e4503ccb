pub mod batch;
pub mod client;
pub mod messages;

pub use batch::{BatchTranscriber, BatchTranscriberConfig};
pub use client::AssemblyAiStream;
pub use messages::AssemblyAiMessage;

/// Default streaming endpoint (WebSocket).
pub const ASSEMBLYAI_STREAMING_URL: &str = "wss://streaming.assemblyai.com";

/// Default REST endpoint for non-streaming transcription.
pub const ASSEMBLYAI_API_URL: &str = "https://api.assemblyai.com";
