//! Custom error types specific to authentication failures.
//!
//! This module defines the errors that can occur while registering, signing in,
//! resolving a session or checking a permission. They convert into `AppError` so
//! handlers can use `?` directly.

use thiserror::Error;

use super::rbac::{AdminFeature, Role};
use crate::database::DbError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is blocked")]
    Blocked,

    #[error("No session")]
    SessionMissing,

    #[error("Session expired")]
    SessionExpired,

    #[error("Password must be at least 8 characters long")]
    WeakPassword,

    #[error("Email address is invalid")]
    InvalidEmail,

    #[error("Display name is required")]
    DisplayNameRequired,

    #[error("Email address is already registered")]
    EmailTaken,

    #[error("Access to {0} is not allowed")]
    MissingFeature(AdminFeature),

    #[error("Not allowed to assign role {0}")]
    RoleNotAssignable(Role),

    #[error(transparent)]
    Database(#[from] DbError),

    #[error("Password hashing failed: {0}")]
    Hashing(String),
}
