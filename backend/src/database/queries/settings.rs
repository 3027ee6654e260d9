//! Key/value site settings.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::database::models::SiteSettings;
use crate::database::DbError;

const MAINTENANCE_MODE: &str = "maintenance_mode";
const MAINTENANCE_MESSAGE: &str = "maintenance_message";
const SITE_TITLE: &str = "site_title";

fn get(conn: &Connection, key: &str) -> Result<Option<String>, DbError> {
    Ok(conn
        .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
            row.get(0)
        })
        .optional()?)
}

fn put(conn: &Connection, key: &str, value: &str, now: DateTime<Utc>) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key, value, now],
    )?;
    Ok(())
}

/// Stored settings, with defaults for anything never written.
pub fn load(conn: &Connection) -> Result<SiteSettings, DbError> {
    let defaults = SiteSettings::default();
    Ok(SiteSettings {
        maintenance_mode: get(conn, MAINTENANCE_MODE)?
            .map(|v| v == "true")
            .unwrap_or(defaults.maintenance_mode),
        maintenance_message: get(conn, MAINTENANCE_MESSAGE)?
            .unwrap_or(defaults.maintenance_message),
        site_title: get(conn, SITE_TITLE)?.unwrap_or(defaults.site_title),
    })
}

/// Writes every key; run it inside the caller's transaction.
pub fn save(conn: &Connection, settings: &SiteSettings, now: DateTime<Utc>) -> Result<(), DbError> {
    put(
        conn,
        MAINTENANCE_MODE,
        if settings.maintenance_mode { "true" } else { "false" },
        now,
    )?;
    put(conn, MAINTENANCE_MESSAGE, &settings.maintenance_message, now)?;
    put(conn, SITE_TITLE, &settings.site_title, now)?;
    Ok(())
}
