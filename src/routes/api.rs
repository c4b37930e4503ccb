//! REST routes.

use axum::Router;
use axum::routing::{get, post};

use crate::handlers::{agent, api};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(api::health_check))
        .route("/agent/chat/{session_id}", post(agent::agent_chat))
}
