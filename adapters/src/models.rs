//! Generic data models for the `adapters` crate.
//!
//! These models define channel-independent representations of an outbound message and
//! of its addressee, so the backend services can describe what to say and to whom
//! without knowing which transport ends up carrying it.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "address", rename_all = "snake_case")]
pub enum Recipient {
    /// A single mailbox, e.g. the author of a claim.
    Email(String),
    /// The configured administrators' chat.
    AdminChat,
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recipient::Email(address) => write!(f, "email:{address}"),
            Recipient::AdminChat => f.write_str("admin-chat"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: Recipient,
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn email(address: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            recipient: Recipient::Email(address.into()),
            subject: subject.into(),
            body: body.into(),
        }
    }

    pub fn admin_chat(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            recipient: Recipient::AdminChat,
            subject: subject.into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Telegram,
    Noop,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Channel::Email => "email",
            Channel::Telegram => "telegram",
            Channel::Noop => "noop",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipient_serializes_with_kind_tag() {
        let json = serde_json::to_value(Recipient::Email("a@b.c".into())).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "email", "address": "a@b.c"}));

        let json = serde_json::to_value(Recipient::AdminChat).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "admin_chat"}));
    }
}
