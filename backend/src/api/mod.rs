//! Central module for organizing the application's main API endpoints.
//!
//! This module acts as a top-level container for the API domains (property registry,
//! claims, publications, directory, feedback, media, user administration, settings,
//! audit log and system endpoints). Authentication routes live in `crate::auth`.

pub mod audit;
pub mod claims;
pub mod directory;
pub mod extract;
pub mod feedback;
pub mod media;
pub mod property;
pub mod publications;
pub mod settings;
pub mod system;
pub mod users;

use axum::Router;
use rusqlite::{Connection, Transaction};

use crate::auth;
use crate::database::models::PageRequest;
use crate::database::DbError;
use crate::errors::AppResult;
use crate::state::AppState;

/// Every route served under `/api`.
pub fn api_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::auth_router(state))
        .merge(system::system_router())
        .merge(property::routes::property_router())
        .merge(claims::routes::claims_router(state))
        .merge(publications::routes::publications_router())
        .merge(directory::routes::directory_router())
        .merge(feedback::routes::feedback_router(state))
        .merge(media::routes::media_router(state))
        .merge(users::routes::users_router())
        .merge(settings::settings_router())
        .merge(audit::audit_router())
}

/// Runs `f` on the database thread. Unlike `Database::call`, `f` reports failures as
/// `AppError`, so handlers can mix query errors with validation and permission errors.
pub(crate) async fn with_db<F, T>(state: &AppState, f: F) -> AppResult<T>
where
    F: FnOnce(&mut Connection) -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    state.db.call(move |conn| Ok(f(conn))).await?
}

/// [`with_db`] inside a transaction that commits only when `f` succeeds. Mutations
/// that write an audit entry go through here so both land or neither does.
pub(crate) async fn with_tx<F, T>(state: &AppState, f: F) -> AppResult<T>
where
    F: FnOnce(&Transaction<'_>) -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    with_db(state, move |conn| {
        let tx = conn.transaction().map_err(DbError::from)?;
        let value = f(&tx)?;
        tx.commit().map_err(DbError::from)?;
        Ok(value)
    })
    .await
}

/// Trimmed copy of a required text field.
pub(crate) fn required(value: &str, field: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(crate::errors::AppError::validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

/// Trimmed optional text, `None` when blank.
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Page request from optional `page`/`per_page` query parameters.
pub(crate) fn page_request(page: Option<u32>, per_page: Option<u32>) -> PageRequest {
    let defaults = PageRequest::default();
    PageRequest {
        page: page.unwrap_or(defaults.page),
        per_page: per_page.unwrap_or(defaults.per_page),
    }
}
