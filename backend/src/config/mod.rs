//! Central module for application-wide configuration settings.
//!
//! This module handles loading and managing configuration parameters such as the
//! database path, server port, media storage, anti-bot windows, rate limits and the
//! credentials of the outbound notification channels. Values come from environment
//! variables; secrets may also be mounted as files under `/run/secrets`.

use std::env;
use std::fmt::Display;
use std::fs::read_to_string;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

const SECRETS_DIR: &str = "/run/secrets";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct AntiBotConfig {
    pub min_seconds: u64,
    pub max_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: u32,
    pub sweep_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    /// `None` keeps the database in memory.
    pub database_path: Option<PathBuf>,
    pub media_dir: PathBuf,
    pub media_max_bytes: usize,
    pub session_ttl: Duration,
    pub session_cookie_secure: bool,
    pub public_base_url: String,
    pub antibot: AntiBotConfig,
    pub rate_limit: RateLimitConfig,
    pub smtp: Option<SmtpConfig>,
    pub telegram: Option<TelegramConfig>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let antibot = AntiBotConfig {
            min_seconds: try_load("ANTIBOT_MIN_SECONDS", "3")?,
            max_seconds: try_load("ANTIBOT_MAX_SECONDS", "3600")?,
        };
        if antibot.min_seconds >= antibot.max_seconds {
            return Err(ConfigError::Invalid {
                key: "ANTIBOT_MIN_SECONDS",
                reason: "must be lower than ANTIBOT_MAX_SECONDS".to_string(),
            });
        }

        let rate_limit = RateLimitConfig {
            window: Duration::from_secs(try_load("RATE_LIMIT_WINDOW_SECS", "60")?),
            max_requests: try_load("RATE_LIMIT_MAX_REQUESTS", "10")?,
            sweep_interval: Duration::from_secs(try_load("RATE_LIMIT_SWEEP_SECS", "300")?),
        };
        if rate_limit.max_requests == 0 || rate_limit.window.is_zero() {
            return Err(ConfigError::Invalid {
                key: "RATE_LIMIT_MAX_REQUESTS",
                reason: "window and request budget must be positive".to_string(),
            });
        }

        let session_hours: u64 = try_load("SESSION_TTL_HOURS", "720")?;

        Ok(Self {
            bind: try_load("COURTYARD_BIND", "0.0.0.0")?,
            port: try_load("COURTYARD_PORT", "8080")?,
            database_path: Some(PathBuf::from(try_load::<String>(
                "DATABASE_PATH",
                "courtyard.sqlite",
            )?)),
            media_dir: PathBuf::from(try_load::<String>("MEDIA_DIR", "media")?),
            media_max_bytes: try_load("MEDIA_MAX_BYTES", "10485760")?,
            session_ttl: Duration::from_secs(session_hours * 3600),
            session_cookie_secure: try_load("SESSION_COOKIE_SECURE", "false")?,
            public_base_url: try_load("PUBLIC_BASE_URL", "http://localhost:8080")?,
            antibot,
            rate_limit,
            smtp: load_smtp()?,
            telegram: load_telegram(),
        })
    }

    /// In-memory database, no outbound channels and a lenient anti-bot window.
    pub fn for_tests() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 0,
            database_path: None,
            media_dir: env::temp_dir().join("courtyard-media"),
            media_max_bytes: 1024 * 1024,
            session_ttl: Duration::from_secs(3600),
            session_cookie_secure: false,
            public_base_url: "http://localhost:8080".to_string(),
            antibot: AntiBotConfig {
                min_seconds: 3,
                max_seconds: 3600,
            },
            rate_limit: RateLimitConfig {
                window: Duration::from_secs(60),
                max_requests: 100,
                sweep_interval: Duration::from_secs(300),
            },
            smtp: None,
            telegram: None,
        }
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    /// Host part of the public URL, used in calendar UIDs.
    pub fn public_host(&self) -> String {
        url::Url::parse(&self.public_base_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| "localhost".to_string())
    }
}

fn load_smtp() -> Result<Option<SmtpConfig>, ConfigError> {
    let Some(host) = optional("SMTP_HOST") else {
        info!("SMTP_HOST not set, email notifications disabled");
        return Ok(None);
    };

    Ok(Some(SmtpConfig {
        host,
        port: try_load("SMTP_PORT", "587")?,
        username: optional("SMTP_USER"),
        password: optional("SMTP_PASSWORD").or_else(|| read_secret("SMTP_PASSWORD")),
        from: try_load("SMTP_FROM", "Courtyard <noreply@localhost>")?,
    }))
}

fn load_telegram() -> Option<TelegramConfig> {
    let bot_token = optional("TELEGRAM_BOT_TOKEN").or_else(|| read_secret("TELEGRAM_BOT_TOKEN"));
    match (bot_token, optional("TELEGRAM_CHAT_ID")) {
        (Some(bot_token), Some(chat_id)) => Some(TelegramConfig { bot_token, chat_id }),
        _ => {
            info!("Telegram bot not configured, chat notifications disabled");
            None
        }
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let raw = optional(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.trim().parse().map_err(|err: T::Err| {
        warn!("Invalid {key} value: {err}");
        ConfigError::Invalid {
            key,
            reason: err.to_string(),
        }
    })
}

fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("{SECRETS_DIR}/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|err| {
            warn!("Failed to read {secret_name} from file: {err}");
        })
        .ok()
        .filter(|s| !s.is_empty())
}
