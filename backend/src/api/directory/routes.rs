//! Defines the HTTP routes for the directory.

use axum::routing::{get, put};
use axum::Router;

use super::handlers::*;
use crate::state::AppState;

pub fn directory_router() -> Router<AppState> {
    Router::new()
        .route("/directory", get(public_directory))
        .route("/admin/directory", get(list_entries).post(create_entry))
        .route("/admin/directory/:id", put(update_entry).delete(delete_entry))
        .route("/admin/directory/:id/contacts", put(replace_contacts))
}
