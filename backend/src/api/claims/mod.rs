//! Module for property claims: residents asking to be linked to an apartment or
//! parking spot, and staff reviewing those requests.

pub mod handlers;
pub mod routes;
