//! Module for media uploads managed by staff with the `media` feature.
//!
//! Uploaded files are written to the media directory and served statically under
//! `/media/`; this module only handles their metadata and lifecycle.

pub mod handlers;
pub mod routes;
