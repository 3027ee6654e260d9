//! Module for publications: news, events and announcements.
//!
//! Public listings only ever show published items. Staff with the `publications`
//! feature manage drafts and move items through the status lifecycle.

pub mod handlers;
pub mod routes;
