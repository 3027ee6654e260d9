//! Fire-and-forget dispatch of notifications to the configured channels.
//!
//! Delivery never blocks or fails a request: each notification is handed to a spawned
//! task, routed to the first channel that accepts its recipient, and failures are only
//! logged.

use std::sync::Arc;

use courtyard_adapters::{
    EmailNotifier, NoopNotifier, Notification, Notifier, SmtpSettings, TelegramNotifier,
    TelegramSettings,
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::database::models::{Claim, ClaimStatus, Feedback, Publication};

#[derive(Clone, Default)]
pub struct Notifications {
    channels: Arc<Vec<Arc<dyn Notifier>>>,
}

impl Notifications {
    pub fn with_channels(channels: Vec<Arc<dyn Notifier>>) -> Self {
        Self {
            channels: Arc::new(channels),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let mut channels: Vec<Arc<dyn Notifier>> = Vec::new();

        if let Some(smtp) = &config.smtp {
            match EmailNotifier::new(SmtpSettings {
                host: smtp.host.clone(),
                port: smtp.port,
                username: smtp.username.clone(),
                password: smtp.password.clone(),
                from: smtp.from.clone(),
            }) {
                Ok(notifier) => channels.push(Arc::new(notifier)),
                Err(err) => warn!(error = %err, "email channel disabled"),
            }
        }

        if let Some(telegram) = &config.telegram {
            match TelegramNotifier::new(TelegramSettings::new(
                telegram.bot_token.clone(),
                telegram.chat_id.clone(),
            )) {
                Ok(notifier) => channels.push(Arc::new(notifier)),
                Err(err) => warn!(error = %err, "telegram channel disabled"),
            }
        }

        if channels.is_empty() {
            info!("no notification channels configured, notifications will be dropped");
            channels.push(Arc::new(NoopNotifier));
        } else {
            info!(channels = channels.len(), "notification channels ready");
        }
        Self::with_channels(channels)
    }

    /// Queues `notification` for delivery. Returns `None` when no channel accepts it.
    pub fn dispatch(&self, notification: Notification) -> Option<JoinHandle<()>> {
        let Some(channel) = self
            .channels
            .iter()
            .find(|channel| channel.accepts(&notification.recipient))
            .cloned()
        else {
            debug!(recipient = %notification.recipient, "no channel for notification");
            return None;
        };

        Some(tokio::spawn(async move {
            match channel.send(&notification).await {
                Ok(()) => debug!(
                    channel = %channel.channel(),
                    subject = %notification.subject,
                    "notification delivered"
                ),
                Err(err) => warn!(
                    channel = %channel.channel(),
                    recipient = %notification.recipient,
                    error = %err,
                    "notification failed"
                ),
            }
        }))
    }
}

pub fn claim_submitted(claim: &Claim, claimant: &str) -> Notification {
    Notification::admin_chat(
        "New property claim",
        format!(
            "{} claims {} as {}.\nComment: {}",
            claimant,
            claim.property_label.as_deref().unwrap_or("an unknown unit"),
            claim.relation,
            claim.comment.as_deref().unwrap_or("-")
        ),
    )
}

pub fn claim_reviewed(claim: &Claim, email: &str) -> Notification {
    let unit = claim.property_label.as_deref().unwrap_or("your unit");
    let body = match claim.status {
        ClaimStatus::Approved => format!("Your claim for {unit} has been approved."),
        _ => format!(
            "Your claim for {unit} has been rejected.\nReason: {}",
            claim.admin_comment.as_deref().unwrap_or("-")
        ),
    };
    Notification::email(email, format!("Claim #{}: {}", claim.id, claim.status), body)
}

pub fn feedback_received(feedback: &Feedback) -> Notification {
    Notification::admin_chat(
        format!("Feedback: {}", feedback.category),
        format!(
            "From {} <{}>\n\n{}",
            feedback.name, feedback.email, feedback.message
        ),
    )
}

pub fn publication_published(publication: &Publication, base_url: &str) -> Notification {
    Notification::admin_chat(
        format!("Published {}: {}", publication.kind, publication.title),
        format!("{}\n\n{}", publication.excerpt, publication.public_url(base_url)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::database::models::{PublicationKind, PublicationStatus};
    use courtyard_adapters::{AdapterError, Channel, Recipient};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        sent: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl Notifier for Recording {
        fn channel(&self) -> Channel {
            Channel::Telegram
        }

        fn accepts(&self, recipient: &Recipient) -> bool {
            matches!(recipient, Recipient::AdminChat)
        }

        async fn send(&self, notification: &Notification) -> Result<(), AdapterError> {
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn routes_to_accepting_channel() {
        let recording = Arc::new(Recording::default());
        let channel: Arc<dyn Notifier> = recording.clone();
        let notifications = Notifications::with_channels(vec![channel]);

        let handle = notifications
            .dispatch(Notification::admin_chat("hello", "world"))
            .expect("chat channel");
        handle.await.unwrap();
        assert_eq!(recording.sent.lock().unwrap().len(), 1);

        assert!(notifications
            .dispatch(Notification::email("a@b.c", "s", "b"))
            .is_none());
    }

    #[tokio::test]
    async fn unconfigured_channels_fall_back_to_noop() {
        let notifications = Notifications::from_config(&Config::for_tests());
        assert_eq!(notifications.channels.len(), 1);
        assert_eq!(notifications.channels[0].channel(), Channel::Noop);

        let handle = notifications
            .dispatch(Notification::email("a@b.c", "s", "b"))
            .expect("noop accepts everything");
        handle.await.unwrap();
    }

    fn publication(kind: PublicationKind, slug: &str) -> Publication {
        let now = chrono::Utc::now();
        Publication {
            id: 1,
            kind,
            title: "Water outage".into(),
            slug: slug.into(),
            content: serde_json::Value::Null,
            excerpt: "Tuesday morning".into(),
            status: PublicationStatus::Published,
            pinned: false,
            cover_media_id: None,
            event_start: None,
            event_end: None,
            event_location: None,
            author_id: None,
            published_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn published_links_point_at_the_section_page() {
        let news = publication_published(&publication(PublicationKind::News, "water"), "https://yard.example/");
        assert!(news.body.ends_with("\n\nhttps://yard.example/news/water"), "{}", news.body);

        let event = publication_published(&publication(PublicationKind::Event, "meeting"), "https://yard.example");
        assert!(event.body.ends_with("https://yard.example/events/meeting"), "{}", event.body);

        let notice = publication_published(&publication(PublicationKind::Announcement, "lift"), "https://yard.example");
        assert!(notice.body.ends_with("https://yard.example/news/lift"), "{}", notice.body);
    }

    #[tokio::test]
    async fn no_channels_is_silent() {
        let notifications = Notifications::default();
        assert!(notifications
            .dispatch(Notification::admin_chat("s", "b"))
            .is_none());
    }
}
