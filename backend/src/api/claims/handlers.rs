//! Handler functions for property claims.
//!
//! Submissions go through the anti-bot check and notify the admin chat. Decisions are
//! audited and emailed to the claimant; delivery happens in the background and never
//! affects the response.

use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::api::extract::{Json, Path, Query};
use crate::api::{optional_text, page_request, with_db, with_tx};
use crate::auth::{require_feature, AdminFeature, CurrentUser};
use crate::database::models::{
    Claim, ClaimRelation, ClaimStatus, Page, PropertyKind, PropertyLink,
};
use crate::database::queries::claims::{self, NewClaim};
use crate::database::queries::users;
use crate::errors::{AppError, AppResult};
use crate::services::antibot::{self, BotCheck};
use crate::services::{audit, notifications};
use crate::state::AppState;

const MAX_COMMENT_CHARS: usize = 2000;

#[derive(Debug, Deserialize)]
pub struct SubmitClaimRequest {
    pub property_kind: PropertyKind,
    pub property_id: i64,
    pub relation: ClaimRelation,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub bot_check: BotCheck,
}

#[derive(Debug, Deserialize)]
pub struct ReviewQuery {
    pub status: Option<ClaimStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApproveRequest {
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

pub async fn submit_claim(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<SubmitClaimRequest>,
) -> AppResult<(StatusCode, Json<Claim>)> {
    antibot::check_submission(
        &request.bot_check,
        Utc::now().timestamp_millis(),
        &state.config.antibot,
    )?;
    let comment = optional_text(request.comment);
    if comment
        .as_ref()
        .is_some_and(|c| c.chars().count() > MAX_COMMENT_CHARS)
    {
        return Err(AppError::validation(format!(
            "comment must be at most {MAX_COMMENT_CHARS} characters"
        )));
    }

    let new_claim = NewClaim {
        user_id: user.id(),
        property_kind: request.property_kind,
        property_id: request.property_id,
        relation: request.relation,
        comment,
    };
    let claim = with_db(&state, move |conn| Ok(claims::insert(conn, &new_claim, Utc::now())?)).await?;

    info!(claim_id = claim.id, user_id = claim.user_id, "claim submitted");
    let claimant = format!("{} <{}>", user.user.display_name, user.user.email);
    state
        .notifications
        .dispatch(notifications::claim_submitted(&claim, &claimant));
    Ok((StatusCode::CREATED, Json(claim)))
}

pub async fn my_claims(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<Claim>>> {
    let user_id = user.id();
    let claims = with_db(&state, move |conn| Ok(claims::list_for_user(conn, user_id)?)).await?;
    Ok(Json(claims))
}

pub async fn cancel_claim(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Claim>> {
    let user_id = user.id();
    let claim = with_db(&state, move |conn| {
        let claim = claims::find(conn, id)?;
        if claim.user_id != user_id {
            return Err(AppError::forbidden("Only the author can cancel a claim"));
        }
        Ok(claims::cancel(conn, id, Utc::now())?)
    })
    .await?;

    info!(claim_id = id, user_id, "claim cancelled");
    Ok(Json(claim))
}

pub async fn my_property(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<PropertyLink>>> {
    let user_id = user.id();
    let links = with_db(&state, move |conn| Ok(claims::links_for_user(conn, user_id)?)).await?;
    Ok(Json(links))
}

pub async fn review_queue(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ReviewQuery>,
) -> AppResult<Json<Page<Claim>>> {
    require_feature(&user, AdminFeature::Claims)?;
    let page = page_request(query.page, query.per_page);
    let status = query.status;
    let (items, total) =
        with_db(&state, move |conn| Ok(claims::list_by_status(conn, status, page)?)).await?;
    Ok(Json(Page::new(items, total, page)))
}

/// Emails the claimant about a decision.
fn notify_claimant(state: &AppState, claim: &Claim, email: &str) {
    state
        .notifications
        .dispatch(notifications::claim_reviewed(claim, email));
}

pub async fn approve_claim(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    request: Option<Json<ApproveRequest>>,
) -> AppResult<Json<Claim>> {
    require_feature(&user, AdminFeature::Claims)?;
    let reviewer = user.id();
    let comment = request.and_then(|Json(r)| optional_text(r.comment));

    let (claim, email) = with_tx(&state, move |conn| {
        let claim = claims::approve(conn, id, reviewer, comment.as_deref(), Utc::now())?;
        audit::record(
            conn,
            reviewer,
            "claim.approve",
            "claim",
            Some(id),
            json!({ "user_id": claim.user_id, "role": claim.relation.granted_role() }),
        )?;
        let email = users::find_user(conn, claim.user_id)?.email;
        Ok((claim, email))
    })
    .await?;

    info!(claim_id = id, reviewer, "claim approved");
    notify_claimant(&state, &claim, &email);
    Ok(Json(claim))
}

pub async fn reject_claim(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(request): Json<RejectRequest>,
) -> AppResult<Json<Claim>> {
    require_feature(&user, AdminFeature::Claims)?;
    let reviewer = user.id();
    let reason = request.reason.trim().to_string();
    if reason.is_empty() {
        return Err(AppError::validation("A rejection reason is required"));
    }

    let (claim, email) = with_tx(&state, move |conn| {
        let claim = claims::reject(conn, id, reviewer, &reason, Utc::now())?;
        audit::record(
            conn,
            reviewer,
            "claim.reject",
            "claim",
            Some(id),
            json!({ "user_id": claim.user_id, "reason": reason }),
        )?;
        let email = users::find_user(conn, claim.user_id)?.email;
        Ok((claim, email))
    })
    .await?;

    info!(claim_id = id, reviewer, "claim rejected");
    notify_claimant(&state, &claim, &email);
    Ok(Json(claim))
}
