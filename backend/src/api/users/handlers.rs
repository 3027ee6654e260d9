//! Handler functions for user profile and management API endpoints.
//!
//! Administrative actions are bounded by rank: nobody acts on themselves or on a user
//! ranking at or above them, and roles change only within `rbac::can_assign`.

use std::collections::BTreeSet;

use axum::extract::State;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::api::extract::{Json, Path, Query};
use crate::api::{optional_text, page_request, required, with_db, with_tx};
use crate::auth::{rbac, require_feature, AdminFeature, AuthError, CurrentUser, Role};
use crate::database::models::{Page, User, UserWithRoles};
use crate::database::queries::users;
use crate::errors::{AppError, AppResult};
use crate::services::audit;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UserSearchQuery {
    pub q: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    pub display_name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RolesRequest {
    pub roles: Vec<Role>,
}

/// Roles to add and remove to get from `current` to `wanted`.
pub fn role_changes(current: &[Role], wanted: &[Role]) -> (Vec<Role>, Vec<Role>) {
    let current: BTreeSet<Role> = current.iter().copied().collect();
    let wanted: BTreeSet<Role> = wanted.iter().copied().collect();
    (
        wanted.difference(&current).copied().collect(),
        current.difference(&wanted).copied().collect(),
    )
}

/// Refuses actions on oneself and on users of equal or higher rank.
fn ensure_can_manage(actor: &CurrentUser, target_id: i64, target_roles: &[Role]) -> AppResult<()> {
    if !rbac::can_manage_accounts(&actor.roles) {
        return Err(AppError::forbidden("Changing accounts requires the admin role"));
    }
    if actor.id() == target_id {
        return Err(AppError::forbidden("You cannot change your own account here"));
    }
    if !rbac::outranks(&actor.roles, target_roles) {
        return Err(AppError::forbidden("The user ranks at or above you"));
    }
    Ok(())
}

pub async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<ProfileRequest>,
) -> AppResult<Json<User>> {
    let user_id = user.id();
    let display_name = required(&request.display_name, "display_name")?;
    let phone = optional_text(request.phone);
    let updated = with_db(&state, move |conn| {
        Ok(users::update_profile(conn, user_id, &display_name, phone.as_deref())?)
    })
    .await?;
    Ok(Json(updated))
}

pub async fn search_users(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<UserSearchQuery>,
) -> AppResult<Json<Page<UserWithRoles>>> {
    require_feature(&user, AdminFeature::Users)?;
    let page = page_request(query.page, query.per_page);
    let (items, total) =
        with_db(&state, move |conn| Ok(users::search_users(conn, query.q.as_deref(), page)?)).await?;
    Ok(Json(Page::new(items, total, page)))
}

pub async fn set_roles(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(request): Json<RolesRequest>,
) -> AppResult<Json<UserWithRoles>> {
    require_feature(&user, AdminFeature::Users)?;
    let actor = user.clone();

    let updated = with_tx(&state, move |conn| {
        let target = users::find_user(conn, id)?;
        let current = users::roles_of(conn, id)?;
        ensure_can_manage(&actor, id, &current)?;

        let (added, removed) = role_changes(&current, &request.roles);
        if let Some(role) = added
            .iter()
            .chain(&removed)
            .find(|role| !rbac::can_assign(&actor.roles, **role))
        {
            return Err(AuthError::RoleNotAssignable(*role).into());
        }

        let now = Utc::now();
        for role in &added {
            users::grant_role(conn, id, *role, now)?;
        }
        for role in &removed {
            users::revoke_role(conn, id, *role)?;
        }
        audit::record(
            conn,
            actor.id(),
            "user.roles",
            "user",
            Some(id),
            json!({ "added": added, "removed": removed }),
        )?;
        Ok(users::with_roles(conn, target)?)
    })
    .await?;

    info!(user_id = id, actor = user.id(), roles = ?updated.roles, "roles changed");
    Ok(Json(updated))
}

async fn set_blocked(
    state: &AppState,
    user: &CurrentUser,
    id: i64,
    blocked: bool,
) -> AppResult<Json<UserWithRoles>> {
    require_feature(user, AdminFeature::Users)?;
    let actor = user.clone();

    let updated = with_tx(state, move |conn| {
        let current = users::roles_of(conn, id)?;
        users::find_user(conn, id)?;
        ensure_can_manage(&actor, id, &current)?;

        users::set_blocked(conn, id, blocked)?;
        let action = if blocked { "user.block" } else { "user.unblock" };
        audit::record(conn, actor.id(), action, "user", Some(id), json!({}))?;
        Ok(users::with_roles(conn, users::find_user(conn, id)?)?)
    })
    .await?;

    info!(user_id = id, actor = user.id(), blocked, "block state changed");
    Ok(Json(updated))
}

pub async fn block_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<UserWithRoles>> {
    set_blocked(&state, &user, id, true).await
}

pub async fn unblock_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<UserWithRoles>> {
    set_blocked(&state, &user, id, false).await
}
