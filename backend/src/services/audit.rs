//! Recording of administrative actions.

use chrono::Utc;
use rusqlite::Connection;
use serde_json::Value;
use tracing::info;

use crate::database::queries::audit::{self, NewAuditEntry};
use crate::database::DbError;

/// Writes an audit entry for `action` (`<entity>.<verb>`) performed by `actor`.
pub fn record(
    conn: &Connection,
    actor: i64,
    action: &str,
    entity_type: &str,
    entity_id: Option<i64>,
    details: Value,
) -> Result<(), DbError> {
    audit::record(
        conn,
        NewAuditEntry {
            actor_id: Some(actor),
            action,
            entity_type,
            entity_id,
            details,
        },
        Utc::now(),
    )?;
    info!(actor, action, entity_type, entity_id, "audited");
    Ok(())
}
