//! Defines the HTTP routes for publications and event calendars.

use axum::routing::{get, post};
use axum::Router;

use super::handlers::*;
use crate::state::AppState;

pub fn publications_router() -> Router<AppState> {
    Router::new()
        .route("/publications", get(list_published))
        .route("/publications/:slug", get(get_published))
        .route("/news", get(list_news))
        .route("/events/upcoming", get(upcoming_events))
        .route("/events/:slug/calendar.ics", get(event_calendar))
        .route("/admin/publications", get(list_all).post(create_publication))
        .route(
            "/admin/publications/:id",
            get(get_publication)
                .put(update_publication)
                .delete(delete_publication),
        )
        .route("/admin/publications/:id/status", post(change_status))
}
