//! Custom error types specific to the `adapters` crate.
//!
//! This module defines errors that can occur while configuring a channel, building a
//! message or handing it to the remote service, providing a unified error handling
//! mechanism for all outbound notifications.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Channel misconfigured: {0}")]
    Configuration(String),

    #[error("Failed to build message: {0}")]
    MessageBuild(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Remote service rejected message ({status}): {description}")]
    Rejected { status: u16, description: String },

    #[error("{channel} cannot deliver to {recipient}")]
    UnsupportedRecipient { channel: String, recipient: String },
}
