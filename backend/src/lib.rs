//! Backend of the Courtyard residential community portal.
//!
//! A JSON API over SQLite for residents (registration, property claims, news, events,
//! the contact directory and feedback) and for the staff who run the portal (the
//! property registry, claim review, publishing, media, user administration, settings
//! and the audit log).
//!
//! # Layout
//! - [`config`]: environment configuration.
//! - [`database`]: connection handle, migrations, models and query functions.
//! - [`auth`]: accounts, sessions and role-based access control.
//! - [`middleware`]: request tracing, the maintenance gate and rate limiting.
//! - [`services`]: anti-bot checks, calendar export, content text, slugs, media storage,
//!   audit and notification dispatch.
//! - [`api`]: HTTP handlers grouped by domain.
//!
//! Outbound email and chat delivery live in the `courtyard-adapters` crate.

#[macro_use]
mod macros;

pub mod api;
pub mod auth;
pub mod config;
pub mod database;
pub mod errors;
pub mod middleware;
pub mod services;
pub mod state;

use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::warn;

use crate::config::Config;
use crate::errors::AppError;
use crate::state::AppState;

fn cors(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(60 * 60));

    match HeaderValue::from_str(config.public_base_url.trim_end_matches('/')) {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            warn!(url = %config.public_base_url, "PUBLIC_BASE_URL is not a valid origin, CORS disabled");
            layer
        }
    }
}

async fn unknown_route() -> AppError {
    AppError::not_found("route")
}

/// The complete application: `/api`, uploaded files under `/media` and the global
/// middleware stack.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", api::api_router(&state))
        .nest_service("/media", ServeDir::new(&state.config.media_dir))
        .fallback(unknown_route)
        .layer(from_fn_with_state(
            state.clone(),
            middleware::maintenance_gate,
        ))
        .layer(cors(&state.config))
        .layer(from_fn(middleware::request_tracing))
        .with_state(state)
}
