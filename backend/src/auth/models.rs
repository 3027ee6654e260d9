//! Data structures for authentication-related entities.
//!
//! This module defines the request payloads for registration, login and password
//! changes, the session response, and the `/me` view combining a user with their
//! roles, features and navigation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::rbac::{AdminFeature, NavItem, Role};
use crate::database::models::User;
use crate::services::antibot::BotCheck;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub bot_check: BotCheck,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// A freshly issued session. The raw token is only ever sent to the client.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub user_id: i64,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
    pub roles: Vec<Role>,
    pub features: BTreeSet<AdminFeature>,
    pub admin_navigation: Vec<NavItem>,
    pub cabinet_navigation: Vec<NavItem>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: User,
    pub roles: Vec<Role>,
    pub token: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}
