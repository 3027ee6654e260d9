//! Defines the HTTP routes for media management.

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get};
use axum::Router;

use super::handlers::*;
use crate::state::AppState;

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn media_router(state: &AppState) -> Router<AppState> {
    let limit = state.config.media_max_bytes + MULTIPART_OVERHEAD;
    Router::new()
        .route(
            "/admin/media",
            get(list_media).post(upload_media).layer(DefaultBodyLimit::max(limit)),
        )
        .route("/admin/media/:id", delete(delete_media))
}
