//! WebSocket routes.

use axum::Router;
use axum::routing::any;

use crate::handlers::session::ws_handler;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/ws", any(ws_handler))
}
