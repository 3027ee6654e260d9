//! Maintenance-mode gate.
//!
//! While the `maintenance_mode` setting is on, everyone except staff is turned away:
//! browser navigations are redirected to the maintenance page and API calls receive a
//! 503 carrying the configured message. The flag is cached in memory and refreshed by
//! the settings endpoint, so the gate costs no query per request.

use std::sync::{PoisonError, RwLock};

use axum::extract::{Request, State};
use axum::http::header::ACCEPT;
use axum::http::Method;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use tracing::debug;

use crate::auth::middleware::authenticate;
use crate::database::models::SiteSettings;
use crate::errors::AppError;
use crate::state::AppState;

pub const MAINTENANCE_PAGE: &str = "/maintenance";

const EXEMPT_PATHS: &[&str] = &["/api/health", "/api/settings/public", MAINTENANCE_PAGE];
const EXEMPT_PREFIXES: &[&str] = &["/api/auth/", "/media/"];

/// Process-wide copy of the site settings.
#[derive(Debug, Default)]
pub struct SettingsCache {
    settings: RwLock<SiteSettings>,
}

impl SettingsCache {
    pub fn new(settings: SiteSettings) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }

    pub fn current(&self) -> SiteSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace(&self, settings: SiteSettings) {
        *self
            .settings
            .write()
            .unwrap_or_else(PoisonError::into_inner) = settings;
    }
}

pub fn is_exempt(path: &str) -> bool {
    EXEMPT_PATHS.contains(&path) || EXEMPT_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

fn is_browser_navigation(request: &Request) -> bool {
    request.method() == Method::GET
        && request
            .headers()
            .get(ACCEPT)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|accept| accept.contains("text/html"))
}

pub async fn maintenance_gate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let settings = state.settings.current();
    if !settings.maintenance_mode || is_exempt(request.uri().path()) {
        return next.run(request).await;
    }

    if let Ok(user) = authenticate(&state, request.headers()).await {
        if user.is_staff() {
            return next.run(request).await;
        }
    }

    debug!(path = %request.uri().path(), "request held by maintenance mode");
    if is_browser_navigation(&request) {
        return Redirect::temporary(MAINTENANCE_PAGE).into_response();
    }
    AppError::Maintenance(settings.maintenance_message).into_response()
}
