//! Defines the HTTP routes for feedback.

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;

use super::handlers::*;
use crate::middleware::rate_limit;
use crate::state::AppState;

pub fn feedback_router(state: &AppState) -> Router<AppState> {
    let submit = Router::new()
        .route("/feedback", post(submit_feedback))
        .route_layer(from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .merge(submit)
        .route("/admin/feedback", get(list_feedback))
        .route("/admin/feedback/:id/status", post(update_status))
}
