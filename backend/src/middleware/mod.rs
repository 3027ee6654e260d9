//! General-purpose middleware for the API.
//!
//! This module contains reusable middleware components (request tracing, the
//! maintenance gate and per-client rate limiting) that are applied to different parts
//! of the Axum router.

pub mod maintenance;
pub mod rate_limit;
pub mod request_tracing;

pub use maintenance::{maintenance_gate, SettingsCache};
pub use rate_limit::{rate_limit, RateLimiter};
pub use request_tracing::request_tracing;
