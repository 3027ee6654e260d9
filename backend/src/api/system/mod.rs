//! Health check and the anti-bot form token.

pub mod handlers;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;

pub fn system_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/antibot/token", get(handlers::antibot_token))
}
