//! Module for the public contact form and its admin inbox.

pub mod handlers;
pub mod routes;
