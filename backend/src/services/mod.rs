//! Module for core business logic services.
//!
//! This module encapsulates the stateless helpers the API handlers build on: anti-bot
//! checks for public forms, calendar export, plain-text extraction from rich content,
//! slug generation, media storage and notification dispatch.

pub mod antibot;
pub mod audit;
pub mod calendar;
pub mod content_text;
pub mod media;
pub mod notifications;
pub mod slug;
