//! Defines the HTTP routes for submitting and reviewing claims.

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;

use super::handlers::*;
use crate::middleware::rate_limit;
use crate::state::AppState;

pub fn claims_router(state: &AppState) -> Router<AppState> {
    let submit = Router::new()
        .route("/claims", post(submit_claim))
        .route_layer(from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .merge(submit)
        .route("/claims/mine", get(my_claims))
        .route("/claims/:id/cancel", post(cancel_claim))
        .route("/me/property", get(my_property))
        .route("/admin/claims", get(review_queue))
        .route("/admin/claims/:id/approve", post(approve_claim))
        .route("/admin/claims/:id/reject", post(reject_claim))
}
