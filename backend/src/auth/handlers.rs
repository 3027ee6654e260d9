//! Handler functions for authentication-related API endpoints.
//!
//! These functions parse request data, run the anti-bot check where the form is public,
//! and hand the work to `auth::service` on the database thread. Successful sign-ins set
//! the session cookie and also return the token for non-browser clients.

use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use tracing::info;

use super::middleware::{clear_session_cookie, session_cookie, CurrentUser};
use super::models::{
    ChangePasswordRequest, IssuedSession, LoginRequest, MeResponse, RegisterRequest,
    SessionResponse,
};
use super::rbac;
use super::service::{self, NewUser};
use crate::api::extract::Json;
use crate::database::models::UserWithRoles;
use crate::errors::{AppError, AppResult};
use crate::services::antibot;
use crate::state::AppState;

fn session_ttl(state: &AppState) -> AppResult<chrono::Duration> {
    chrono::Duration::from_std(state.config.session_ttl).map_err(AppError::internal)
}

fn signed_in(
    state: &AppState,
    status: StatusCode,
    session: IssuedSession,
    account: UserWithRoles,
) -> impl IntoResponse {
    let max_age = (session.expires_at - Utc::now()).num_seconds().max(0);
    let cookie = session_cookie(&session.token, max_age, state.config.session_cookie_secure);
    (
        status,
        [(SET_COOKIE, cookie)],
        Json(SessionResponse {
            user: account.user,
            roles: account.roles,
            token: session.token,
            expires_at: session.expires_at,
        }),
    )
}

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> AppResult<impl IntoResponse> {
    antibot::check_submission(
        &request.bot_check,
        Utc::now().timestamp_millis(),
        &state.config.antibot,
    )?;

    let ttl = session_ttl(&state)?;
    let (session, account) = state
        .db
        .call(move |conn| {
            let now = Utc::now();
            let registered = service::register(
                conn,
                NewUser {
                    email: &request.email,
                    password: &request.password,
                    display_name: &request.display_name,
                    phone: request.phone.as_deref(),
                },
                now,
            );
            Ok(registered.and_then(|account| {
                let session = service::issue_session(conn, account.user.id, now, ttl)?;
                Ok((session, account))
            }))
        })
        .await??;

    info!(user_id = account.user.id, "account registered");
    Ok(signed_in(&state, StatusCode::CREATED, session, account))
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let ttl = session_ttl(&state)?;
    let (session, account) = state
        .db
        .call(move |conn| {
            Ok(service::login(
                conn,
                &request.email,
                &request.password,
                Utc::now(),
                ttl,
            ))
        })
        .await??;

    info!(user_id = account.user.id, "signed in");
    Ok(signed_in(&state, StatusCode::OK, session, account))
}

pub async fn logout(State(state): State<AppState>, user: CurrentUser) -> AppResult<impl IntoResponse> {
    let token = user.token.clone();
    state
        .db
        .call(move |conn| Ok(service::logout(conn, &token)))
        .await??;

    Ok((
        StatusCode::NO_CONTENT,
        [(SET_COOKIE, clear_session_cookie(state.config.session_cookie_secure))],
    ))
}

pub async fn me(user: CurrentUser) -> Json<MeResponse> {
    Json(MeResponse {
        features: rbac::features_for(&user.roles),
        admin_navigation: rbac::admin_navigation(&user.roles),
        cabinet_navigation: rbac::cabinet_navigation(&user.roles),
        roles: user.roles,
        user: user.user,
    })
}

pub async fn change_password(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<ChangePasswordRequest>,
) -> AppResult<StatusCode> {
    let user_id = user.id();
    state
        .db
        .call(move |conn| {
            Ok(service::change_password(
                conn,
                user_id,
                &user.token,
                &request.current_password,
                &request.new_password,
            ))
        })
        .await??;

    info!(user_id, "password changed");
    Ok(StatusCode::NO_CONTENT)
}
