//! Zarex Gateway: a real-time voice assistant relay.
//!
//! Browser clients connect over WebSocket, stream microphone audio, and get
//! back live transcripts, assistant replies, and synthesized speech. The
//! gateway is a thin relay between the client and cloud vendors: AssemblyAI
//! for speech recognition, Google Gemini for replies (with web search and
//! weather skills), and Murf or ElevenLabs for speech synthesis.
//!
//! Vendor credentials for the realtime path are supplied by each client in
//! its WebSocket handshake and live only as long as the connection.

pub mod config;
pub mod core;
pub mod dispatch;
pub mod errors;
pub mod handlers;
pub mod recording;
pub mod routes;
pub mod session;
pub mod state;

pub use config::ServerConfig;
pub use routes::create_router;
pub use state::AppState;
