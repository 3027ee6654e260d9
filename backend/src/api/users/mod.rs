//! Module for user profile and management API endpoints.
//!
//! This module handles the signed-in user's own profile and the `users` admin feature:
//! searching accounts, changing their roles and blocking them.

pub mod handlers;
pub mod routes;
