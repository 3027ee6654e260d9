//! Handler functions for feedback.

use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::api::extract::{Json, Path, Query};
use crate::api::{optional_text, page_request, required, with_db, with_tx};
use crate::auth::service::normalize_email;
use crate::auth::{require_feature, AdminFeature, CurrentUser, MaybeUser};
use crate::database::models::{Feedback, FeedbackCategory, FeedbackStatus, Page};
use crate::database::queries::feedback::{self, NewFeedback};
use crate::errors::{AppError, AppResult};
use crate::services::antibot::{self, BotCheck};
use crate::services::{audit, notifications};
use crate::state::AppState;

pub const MAX_MESSAGE_CHARS: usize = 5000;

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub category: FeedbackCategory,
    pub message: String,
    #[serde(default)]
    pub bot_check: BotCheck,
}

#[derive(Debug, Deserialize)]
pub struct InboxQuery {
    pub status: Option<FeedbackStatus>,
    pub category: Option<FeedbackCategory>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: FeedbackStatus,
    #[serde(default)]
    pub note: Option<String>,
}

pub async fn submit_feedback(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Json(request): Json<FeedbackRequest>,
) -> AppResult<(StatusCode, Json<Feedback>)> {
    antibot::check_submission(
        &request.bot_check,
        Utc::now().timestamp_millis(),
        &state.config.antibot,
    )?;

    let message = required(&request.message, "message")?;
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(AppError::validation(format!(
            "message must be at most {MAX_MESSAGE_CHARS} characters"
        )));
    }
    let new_feedback = NewFeedback {
        user_id: user.as_ref().map(CurrentUser::id),
        name: required(&request.name, "name")?,
        email: normalize_email(&request.email)?,
        phone: optional_text(request.phone),
        category: request.category,
        message,
    };

    let item = with_db(&state, move |conn| Ok(feedback::insert(conn, &new_feedback, Utc::now())?)).await?;

    info!(feedback_id = item.id, category = %item.category, "feedback received");
    state
        .notifications
        .dispatch(notifications::feedback_received(&item));
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn list_feedback(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<InboxQuery>,
) -> AppResult<Json<Page<Feedback>>> {
    require_feature(&user, AdminFeature::Feedback)?;
    let page = page_request(query.page, query.per_page);
    let (items, total) = with_db(&state, move |conn| {
        Ok(feedback::list(conn, query.status, query.category, page)?)
    })
    .await?;
    Ok(Json(Page::new(items, total, page)))
}

pub async fn update_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(request): Json<StatusRequest>,
) -> AppResult<Json<Feedback>> {
    require_feature(&user, AdminFeature::Feedback)?;
    let actor = user.id();
    let note = optional_text(request.note);
    let status = request.status;

    let item = with_tx(&state, move |conn| {
        let item = feedback::update_status(conn, id, status, note.as_deref(), Utc::now())?;
        audit::record(
            conn,
            actor,
            "feedback.status",
            "feedback",
            Some(id),
            json!({ "status": status, "note": note }),
        )?;
        Ok(item)
    })
    .await?;
    Ok(Json(item))
}
