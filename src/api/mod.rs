pub mod chat;
pub mod sse;

use axum::routing::post;
use axum::Router;

use crate::server::state::AppState;

/// Build the relay API routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/chat", post(chat::handler))
}
