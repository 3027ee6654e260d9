//! Authentication module for managing user accounts, sessions, and access control.
//!
//! This module provides the public interface for user authentication-related functionalities
//! such as login, registration, session management, role-based permissions and the
//! extractors that protect authenticated routes.

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod rbac;
pub mod routes;
pub mod service;

// Re-exports for convenience
pub use errors::AuthError;
pub use middleware::{require_feature, CurrentUser, MaybeUser};
pub use rbac::{AdminFeature, NavItem, Role};
pub use routes::auth_router;
