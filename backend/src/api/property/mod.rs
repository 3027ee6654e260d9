//! Module for the property registry API.
//!
//! Public read access to buildings and parking, and the `buildings` admin feature for
//! maintaining every level of the hierarchy.

pub mod handlers;
pub mod routes;
