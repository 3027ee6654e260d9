//! Handler functions for site settings.
//!
//! Writes go to the database first and then refresh the in-memory copy the maintenance
//! gate reads on every request.

use axum::extract::State;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::api::extract::Json;
use crate::api::{required, with_db, with_tx};
use crate::auth::{require_feature, AdminFeature, CurrentUser};
use crate::database::models::SiteSettings;
use crate::database::queries::settings;
use crate::errors::{AppError, AppResult};
use crate::services::audit;
use crate::state::AppState;

const MAX_MESSAGE_CHARS: usize = 1000;

#[derive(Debug, Serialize)]
pub struct PublicSettings {
    pub site_title: String,
    pub maintenance_mode: bool,
    pub maintenance_message: Option<String>,
}

pub async fn public_settings(State(state): State<AppState>) -> Json<PublicSettings> {
    let current = state.settings.current();
    Json(PublicSettings {
        site_title: current.site_title,
        maintenance_message: current
            .maintenance_mode
            .then_some(current.maintenance_message),
        maintenance_mode: current.maintenance_mode,
    })
}

pub async fn admin_settings(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<SiteSettings>> {
    require_feature(&user, AdminFeature::Settings)?;
    let current = with_db(&state, |conn| Ok(settings::load(conn)?)).await?;
    Ok(Json(current))
}

pub async fn update_settings(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<SiteSettings>,
) -> AppResult<Json<SiteSettings>> {
    require_feature(&user, AdminFeature::Settings)?;
    let actor = user.id();

    let next = SiteSettings {
        maintenance_mode: request.maintenance_mode,
        maintenance_message: required(&request.maintenance_message, "maintenance_message")?,
        site_title: required(&request.site_title, "site_title")?,
    };
    if next.maintenance_message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(AppError::validation(format!(
            "maintenance_message must be at most {MAX_MESSAGE_CHARS} characters"
        )));
    }

    let saved = next.clone();
    with_tx(&state, move |conn| {
        let previous = settings::load(conn)?;
        settings::save(conn, &saved, Utc::now())?;
        audit::record(
            conn,
            actor,
            "settings.update",
            "settings",
            None,
            json!({ "before": previous, "after": saved }),
        )?;
        Ok(())
    })
    .await?;

    state.settings.replace(next.clone());
    info!(maintenance = next.maintenance_mode, actor, "site settings updated");
    Ok(Json(next))
}
