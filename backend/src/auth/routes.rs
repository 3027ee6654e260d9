//! Defines the HTTP routes specifically for authentication.
//!
//! These routes handle registration, login, logout, the current-user view and password
//! changes. They are nested under `/api/auth` by the main router.

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;

use super::handlers::{change_password, login, logout, me, register};
use crate::middleware::rate_limit;
use crate::state::AppState;

pub fn auth_router(state: &AppState) -> Router<AppState> {
    let limited = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route_layer(from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .merge(limited)
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/password", post(change_password))
}
