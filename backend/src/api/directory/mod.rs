//! Module for the community directory of useful contacts.

pub mod handlers;
pub mod routes;
