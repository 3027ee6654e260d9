//! Site-wide settings: the maintenance switch and the site title.

pub mod handlers;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use handlers::{admin_settings, public_settings, update_settings};

pub fn settings_router() -> Router<AppState> {
    Router::new()
        .route("/settings/public", get(public_settings))
        .route("/admin/settings", get(admin_settings).put(update_settings))
}
