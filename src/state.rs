//! Shared application state.

use std::sync::Arc;

use dashmap::DashMap;

use crate::config::ServerConfig;
use crate::session::Turn;

/// State shared across all routes.
///
/// Realtime session state is NOT here; each WebSocket connection owns its own
/// `Session`. The `agent_histories` map only backs the HTTP agent endpoint,
/// which is keyed by a caller-chosen session id and has no connection to tie
/// state to.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Shared HTTP client for all REST vendors. Connection pooling across
    /// sessions is the point of sharing it.
    pub http: reqwest::Client,
    /// Conversation histories for the HTTP agent endpoint.
    pub agent_histories: Arc<DashMap<String, Vec<Turn>>>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;
        Ok(Self {
            config: Arc::new(config),
            http,
            agent_histories: Arc::new(DashMap::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_construction() {
        let state = AppState::new(ServerConfig::default()).unwrap();
        assert!(state.agent_histories.is_empty());
        assert_eq!(state.config.port, 8000);
    }
}
