//! Telegram bot implementation of the `Notifier` trait.
//!
//! Messages are posted to the Bot API `sendMessage` method using HTML parse mode, so the
//! subject can be emphasised while user-provided text is escaped.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::AdapterError;
use crate::models::{Channel, Notification, Recipient};
use crate::Notifier;

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Hard limit of the Bot API for a single text message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

#[derive(Debug, Clone)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub chat_id: String,
    pub api_base: String,
}

impl TelegramSettings {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            api_base: TELEGRAM_API_BASE.to_string(),
        }
    }
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: String,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Deserialize)]
struct BotApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

pub struct TelegramNotifier {
    client: reqwest::Client,
    settings: TelegramSettings,
}

impl TelegramNotifier {
    pub fn new(settings: TelegramSettings) -> Result<Self, AdapterError> {
        if settings.bot_token.trim().is_empty() || settings.chat_id.trim().is_empty() {
            return Err(AdapterError::Configuration(
                "Telegram bot token and chat id are required".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|err| AdapterError::Configuration(err.to_string()))?;

        Ok(Self { client, settings })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.settings.api_base.trim_end_matches('/'),
            self.settings.bot_token
        )
    }
}

/// Escapes the three characters Telegram's HTML mode treats specially.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Formats a notification as a bold subject line followed by the body, truncated to the
/// Bot API message limit.
pub fn render_message(notification: &Notification) -> String {
    let text = format!(
        "<b>{}</b>\n\n{}",
        escape_html(&notification.subject),
        escape_html(&notification.body)
    );
    if text.chars().count() <= MAX_MESSAGE_CHARS {
        return text;
    }

    // Cutting may split an entity like "&amp;" in half; drop any dangling '&' tail.
    let mut cut: String = text.chars().take(MAX_MESSAGE_CHARS - 1).collect();
    if let Some(amp) = cut.rfind('&') {
        if !cut[amp..].contains(';') {
            cut.truncate(amp);
        }
    }
    cut.push('…');
    cut
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn channel(&self) -> Channel {
        Channel::Telegram
    }

    fn accepts(&self, recipient: &Recipient) -> bool {
        matches!(recipient, Recipient::AdminChat)
    }

    async fn send(&self, notification: &Notification) -> Result<(), AdapterError> {
        if !self.accepts(&notification.recipient) {
            return Err(AdapterError::UnsupportedRecipient {
                channel: Channel::Telegram.to_string(),
                recipient: notification.recipient.to_string(),
            });
        }

        let request = SendMessageRequest {
            chat_id: &self.settings.chat_id,
            text: render_message(notification),
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        // The token is part of the URL, so transport errors are reported without it.
        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|err| AdapterError::Delivery(err.without_url().to_string()))?;

        let status = response.status();
        let body: BotApiResponse = response
            .json()
            .await
            .map_err(|err| AdapterError::Delivery(err.without_url().to_string()))?;

        if !status.is_success() || !body.ok {
            return Err(AdapterError::Rejected {
                status: status.as_u16(),
                description: body.description.unwrap_or_else(|| "unknown error".to_string()),
            });
        }

        log::debug!("Telegram accepted message {:?}", notification.subject);
        Ok(())
    }
}
