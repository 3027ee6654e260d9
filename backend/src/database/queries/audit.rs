//! Append-only audit log of administrative actions.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde_json::Value;

use crate::database::models::{AuditEntry, PageRequest};
use crate::database::DbError;

pub struct NewAuditEntry<'a> {
    pub actor_id: Option<i64>,
    pub action: &'a str,
    pub entity_type: &'a str,
    pub entity_id: Option<i64>,
    pub details: Value,
}

pub fn record(conn: &Connection, entry: NewAuditEntry<'_>, now: DateTime<Utc>) -> Result<i64, DbError> {
    conn.execute(
        "INSERT INTO audit_log (actor_id, action, entity_type, entity_id, details, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            entry.actor_id,
            entry.action,
            entry.entity_type,
            entry.entity_id,
            entry.details.to_string(),
            now
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list(
    conn: &Connection,
    entity_type: Option<&str>,
    page: PageRequest,
) -> Result<(Vec<AuditEntry>, i64), DbError> {
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM audit_log WHERE ?1 IS NULL OR entity_type = ?1",
        params![entity_type],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(
        "SELECT a.id, a.actor_id, u.email, a.action, a.entity_type, a.entity_id, a.details, a.created_at
         FROM audit_log a LEFT JOIN users u ON u.id = a.actor_id
         WHERE ?1 IS NULL OR a.entity_type = ?1
         ORDER BY a.id DESC LIMIT ?2 OFFSET ?3",
    )?;
    let rows = stmt.query_map(params![entity_type, page.limit(), page.offset()], |row| {
        let details: String = row.get(6)?;
        Ok(AuditEntry {
            id: row.get(0)?,
            actor_id: row.get(1)?,
            actor_email: row.get(2)?,
            action: row.get(3)?,
            entity_type: row.get(4)?,
            entity_id: row.get(5)?,
            details: serde_json::from_str(&details).unwrap_or(Value::String(details)),
            created_at: row.get(7)?,
        })
    })?;
    Ok((rows.collect::<Result<Vec<_>, _>>()?, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_connection;
    use serde_json::json;

    #[test]
    fn records_newest_first() {
        let conn = test_connection();
        for (action, entity) in [("building.create", "building"), ("claim.approve", "claim")] {
            record(
                &conn,
                NewAuditEntry {
                    actor_id: None,
                    action,
                    entity_type: entity,
                    entity_id: Some(1),
                    details: json!({"n": 1}),
                },
                Utc::now(),
            )
            .unwrap();
        }

        let (entries, total) = list(&conn, None, PageRequest::default()).unwrap();
        assert_eq!(total, 2);
        assert_eq!(entries[0].action, "claim.approve");
        assert_eq!(entries[0].details, json!({"n": 1}));

        let (entries, total) = list(&conn, Some("building"), PageRequest::default()).unwrap();
        assert_eq!(total, 1);
        assert_eq!(entries[0].entity_type, "building");
    }
}
