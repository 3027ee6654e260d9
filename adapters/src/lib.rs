//! Core `adapters` crate for abstracting outbound notification channels.
//!
//! This crate defines the `Notifier` trait, which outlines the single operation every
//! delivery channel supports, and provides the concrete implementations the portal
//! dispatches to: email over SMTP, a Telegram bot for the administrators' chat, and a
//! no-op channel used when nothing is configured.

pub mod email;
pub mod errors;
pub mod models;
pub mod telegram;

use async_trait::async_trait;

pub use email::{EmailNotifier, SmtpSettings};
pub use errors::AdapterError;
pub use models::{Channel, Notification, Recipient};
pub use telegram::{TelegramNotifier, TelegramSettings};

/// A delivery channel for [`Notification`]s.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn channel(&self) -> Channel;

    /// Whether this channel is able to deliver to `recipient` at all.
    fn accepts(&self, recipient: &Recipient) -> bool;

    async fn send(&self, notification: &Notification) -> Result<(), AdapterError>;
}

/// Swallows every notification. Used when a channel is not configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    fn channel(&self) -> Channel {
        Channel::Noop
    }

    fn accepts(&self, _recipient: &Recipient) -> bool {
        true
    }

    async fn send(&self, notification: &Notification) -> Result<(), AdapterError> {
        log::debug!(
            "dropping notification {:?} for {}",
            notification.subject,
            notification.recipient
        );
        Ok(())
    }
}
