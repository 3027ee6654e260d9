//! Defines the HTTP routes for profiles and user administration.

use axum::routing::{get, post, put};
use axum::Router;

use super::handlers::*;
use crate::state::AppState;

pub fn users_router() -> Router<AppState> {
    Router::new()
        .route("/me/profile", put(update_profile))
        .route("/admin/users", get(search_users))
        .route("/admin/users/:id/roles", put(set_roles))
        .route("/admin/users/:id/block", post(block_user))
        .route("/admin/users/:id/unblock", post(unblock_user))
}
