//! SMTP implementation of the `Notifier` trait.
//!
//! The transport is created lazily on the first delivery and reused for the lifetime of
//! the process; building it eagerly would resolve the relay host at startup, which is
//! undesirable when mail is optional.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tokio::sync::OnceCell;

use crate::errors::AdapterError;
use crate::models::{Channel, Notification, Recipient};
use crate::Notifier;

/// Port on which the relay expects implicit TLS instead of STARTTLS.
const IMPLICIT_TLS_PORT: u16 = 465;

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

pub struct EmailNotifier {
    settings: SmtpSettings,
    from: Mailbox,
    transport: OnceCell<AsyncSmtpTransport<Tokio1Executor>>,
}

impl EmailNotifier {
    pub fn new(settings: SmtpSettings) -> Result<Self, AdapterError> {
        if settings.host.trim().is_empty() {
            return Err(AdapterError::Configuration("SMTP host is empty".to_string()));
        }
        let from = settings.from.parse::<Mailbox>().map_err(|err| {
            AdapterError::Configuration(format!("Invalid sender {:?}: {}", settings.from, err))
        })?;

        Ok(Self {
            settings,
            from,
            transport: OnceCell::new(),
        })
    }

    async fn transport(&self) -> Result<&AsyncSmtpTransport<Tokio1Executor>, AdapterError> {
        self.transport
            .get_or_try_init(|| async {
                let builder = if self.settings.port == IMPLICIT_TLS_PORT {
                    AsyncSmtpTransport::<Tokio1Executor>::relay(&self.settings.host)
                } else {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.settings.host)
                }
                .map_err(|err| {
                    AdapterError::Configuration(format!(
                        "Cannot set up SMTP relay {}: {}",
                        self.settings.host, err
                    ))
                })?
                .port(self.settings.port);

                let builder = match (&self.settings.username, &self.settings.password) {
                    (Some(user), Some(password)) => {
                        builder.credentials(Credentials::new(user.clone(), password.clone()))
                    }
                    _ => builder,
                };

                log::info!(
                    "SMTP transport ready for {}:{}",
                    self.settings.host,
                    self.settings.port
                );
                Ok::<_, AdapterError>(builder.build())
            })
            .await
    }

    /// Renders `notification` into a plain-text RFC 5322 message.
    pub fn build_message(&self, notification: &Notification) -> Result<Message, AdapterError> {
        let address = match &notification.recipient {
            Recipient::Email(address) => address,
            other => {
                return Err(AdapterError::UnsupportedRecipient {
                    channel: Channel::Email.to_string(),
                    recipient: other.to_string(),
                })
            }
        };
        let to = address
            .parse::<Mailbox>()
            .map_err(|err| AdapterError::InvalidRecipient(format!("{address}: {err}")))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(notification.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(notification.body.clone())
            .map_err(|err| AdapterError::MessageBuild(err.to_string()))
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    fn accepts(&self, recipient: &Recipient) -> bool {
        matches!(recipient, Recipient::Email(_))
    }

    async fn send(&self, notification: &Notification) -> Result<(), AdapterError> {
        let message = self.build_message(notification)?;
        let transport = self.transport().await?;

        let response = transport
            .send(message)
            .await
            .map_err(|err| AdapterError::Delivery(err.to_string()))?;
        log::debug!(
            "SMTP accepted message for {}: {:?}",
            notification.recipient,
            response.code()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SmtpSettings {
        SmtpSettings {
            host: "smtp.example.org".to_string(),
            port: 587,
            username: None,
            password: None,
            from: "Courtyard <noreply@example.org>".to_string(),
        }
    }

    #[test]
    fn rejects_invalid_sender() {
        let mut bad = settings();
        bad.from = "not an address".to_string();
        assert!(matches!(
            EmailNotifier::new(bad),
            Err(AdapterError::Configuration(_))
        ));
    }

    #[test]
    fn builds_plain_text_message() {
        let notifier = EmailNotifier::new(settings()).unwrap();
        let note = Notification::email("resident@example.org", "Claim approved", "Welcome home");
        let message = notifier.build_message(&note).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Claim approved"));
        assert!(raw.contains("To: resident@example.org"));
        assert!(raw.contains("Welcome home"));
    }

    #[test]
    fn refuses_chat_recipient() {
        let notifier = EmailNotifier::new(settings()).unwrap();
        let note = Notification::admin_chat("New claim", "body");
        assert!(!notifier.accepts(&note.recipient));
        assert!(matches!(
            notifier.build_message(&note),
            Err(AdapterError::UnsupportedRecipient { .. })
        ));
    }

    #[test]
    fn rejects_malformed_recipient() {
        let notifier = EmailNotifier::new(settings()).unwrap();
        let note = Notification::email("nobody", "s", "b");
        assert!(matches!(
            notifier.build_message(&note),
            Err(AdapterError::InvalidRecipient(_))
        ));
    }
}
