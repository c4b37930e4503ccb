//! Plain REST handlers.

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use crate::state::AppState;

/// Health check at `GET /`.
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "zarex-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "agent_sessions": state.agent_histories.len(),
    }))
}
