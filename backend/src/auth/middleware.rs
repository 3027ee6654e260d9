//! Middleware for protecting authenticated routes and handling authorization.
//!
//! This module contains the request extractors that turn a session cookie (or bearer
//! token) into a `CurrentUser`, and the permission checks handlers run against the
//! caller's roles.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use chrono::Utc;
use tracing::debug;

use super::errors::AuthError;
use super::rbac::{self, AdminFeature, Role};
use super::service;
use crate::database::models::User;
use crate::errors::AppError;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "courtyard_session";

#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub roles: Vec<Role>,
    /// Raw session token the request was authenticated with.
    pub token: String,
}

impl CurrentUser {
    pub fn id(&self) -> i64 {
        self.user.id
    }

    pub fn is_staff(&self) -> bool {
        rbac::is_staff(&self.roles)
    }

    pub fn has(&self, feature: AdminFeature) -> bool {
        rbac::has_feature(&self.roles, feature)
    }
}

/// Fails with 403 unless the caller's roles grant `feature`.
pub fn require_feature(user: &CurrentUser, feature: AdminFeature) -> Result<(), AppError> {
    if user.has(feature) {
        Ok(())
    } else {
        debug!(user_id = user.id(), feature = %feature, "feature denied");
        Err(AuthError::MissingFeature(feature).into())
    }
}

/// Session token from the session cookie, or from an `Authorization: Bearer` header.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string());

    from_cookie
        .or_else(|| {
            headers
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(|token| token.trim().to_string())
        })
        .filter(|token| !token.is_empty())
}

pub fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie =
        format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_session_cookie(secure: bool) -> String {
    session_cookie("", 0, secure)
}

/// Resolves the caller behind `headers`, if any.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<CurrentUser, AppError> {
    let token = session_token(headers).ok_or(AuthError::SessionMissing)?;
    let lookup = token.clone();
    let (user, roles) = state
        .db
        .call(move |conn| Ok(service::resolve_session(conn, &lookup, Utc::now())))
        .await??;
    Ok(CurrentUser { user, roles, token })
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<CurrentUser>() {
            return Ok(user.clone());
        }
        let user = authenticate(state, &parts.headers).await?;
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}

/// The caller if signed in; anonymous requests and stale sessions yield `None`.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<CurrentUser>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match CurrentUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(MaybeUser(Some(user))),
            Err(AppError::Unauthenticated | AppError::Forbidden(_)) => Ok(MaybeUser(None)),
            Err(err) => Err(err),
        }
    }
}
