//! Anti-bot heuristics for public form submissions.
//!
//! A submission carries three signals: a time token issued when the form was rendered,
//! a client fingerprint checksum and a honeypot field. None of them is cryptographic;
//! together they filter the bulk of scripted spam without bothering people.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AntiBotConfig;

/// Tolerated difference between client-visible and server clocks.
const CLOCK_SKEW_MS: i64 = 5_000;

static FINGERPRINT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-f]{8}$").expect("valid fingerprint pattern"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BotCheckError {
    #[error("form token is malformed")]
    Malformed,
    #[error("form token is from the future")]
    FromFuture,
    #[error("form submitted too fast")]
    TooFast,
    #[error("form token expired, reload the page")]
    Expired,
    #[error("client fingerprint is invalid")]
    Fingerprint,
    #[error("honeypot field is filled")]
    Honeypot,
}

/// Anti-bot fields embedded in protected forms.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotCheck {
    #[serde(default)]
    pub time_token: String,
    #[serde(default)]
    pub fingerprint: String,
    /// Hidden input that humans never fill.
    #[serde(default)]
    pub website: String,
}

pub fn encode_time_token(timestamp_ms: i64) -> String {
    URL_SAFE_NO_PAD.encode(timestamp_ms.to_string())
}

pub fn decode_time_token(token: &str) -> Result<i64, BotCheckError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token.trim())
        .map_err(|_| BotCheckError::Malformed)?;
    let text = std::str::from_utf8(&bytes).map_err(|_| BotCheckError::Malformed)?;
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(BotCheckError::Malformed);
    }
    text.parse().map_err(|_| BotCheckError::Malformed)
}

pub fn validate_time_token(
    token: &str,
    now_ms: i64,
    min_seconds: u64,
    max_seconds: u64,
) -> Result<(), BotCheckError> {
    let issued = decode_time_token(token)?;
    let elapsed_ms = now_ms - issued;

    if elapsed_ms < -CLOCK_SKEW_MS {
        return Err(BotCheckError::FromFuture);
    }
    if elapsed_ms < seconds_to_ms(min_seconds) {
        return Err(BotCheckError::TooFast);
    }
    if elapsed_ms > seconds_to_ms(max_seconds) {
        return Err(BotCheckError::Expired);
    }
    Ok(())
}

fn seconds_to_ms(seconds: u64) -> i64 {
    i64::try_from(seconds.saturating_mul(1000)).unwrap_or(i64::MAX)
}

/// 32-bit FNV-1a over the UTF-8 bytes, as 8 lowercase hex digits. Mirrors the checksum
/// the browser computes over its properties.
pub fn fingerprint_checksum(input: &str) -> String {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in input.bytes() {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    format!("{hash:08x}")
}

pub fn is_valid_fingerprint(fingerprint: &str) -> bool {
    FINGERPRINT_RE.is_match(fingerprint)
}

/// Applies the honeypot, fingerprint and time-token checks, in that order.
pub fn check_submission(
    check: &BotCheck,
    now_ms: i64,
    config: &AntiBotConfig,
) -> Result<(), BotCheckError> {
    if !check.website.trim().is_empty() {
        return Err(BotCheckError::Honeypot);
    }
    if !is_valid_fingerprint(&check.fingerprint) {
        return Err(BotCheckError::Fingerprint);
    }
    validate_time_token(
        &check.time_token,
        now_ms,
        config.min_seconds,
        config.max_seconds,
    )
}
