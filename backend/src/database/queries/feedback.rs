//! Messages sent through the contact form.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::database::models::{Feedback, FeedbackCategory, FeedbackStatus, PageRequest};
use crate::database::DbError;

#[derive(Debug, Clone)]
pub struct NewFeedback {
    pub user_id: Option<i64>,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub category: FeedbackCategory,
    pub message: String,
}

const COLUMNS: &str =
    "id, user_id, name, email, phone, category, message, status, admin_note, created_at, updated_at";

fn map_feedback(row: &Row<'_>) -> rusqlite::Result<Feedback> {
    Ok(Feedback {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        category: row.get(5)?,
        message: row.get(6)?,
        status: row.get(7)?,
        admin_note: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

pub fn insert(conn: &Connection, feedback: &NewFeedback, now: DateTime<Utc>) -> Result<Feedback, DbError> {
    conn.execute(
        "INSERT INTO feedback (user_id, name, email, phone, category, message, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            feedback.user_id,
            feedback.name,
            feedback.email,
            feedback.phone,
            feedback.category,
            feedback.message,
            FeedbackStatus::New,
            now
        ],
    )?;
    find(conn, conn.last_insert_rowid())
}

pub fn find(conn: &Connection, id: i64) -> Result<Feedback, DbError> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM feedback WHERE id = ?1"),
        [id],
        map_feedback,
    )
    .optional()?
    .ok_or(DbError::NotFound("feedback"))
}

pub fn list(
    conn: &Connection,
    status: Option<FeedbackStatus>,
    category: Option<FeedbackCategory>,
    page: PageRequest,
) -> Result<(Vec<Feedback>, i64), DbError> {
    const WHERE: &str = "(?1 IS NULL OR status = ?1) AND (?2 IS NULL OR category = ?2)";
    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM feedback WHERE {WHERE}"),
        params![status, category],
        |row| row.get(0),
    )?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM feedback WHERE {WHERE} ORDER BY id DESC LIMIT ?3 OFFSET ?4"
    ))?;
    let rows = stmt.query_map(
        params![status, category, page.limit(), page.offset()],
        map_feedback,
    )?;
    Ok((rows.collect::<Result<Vec<_>, _>>()?, total))
}

/// Sets the status; `note` replaces the admin note only when given.
pub fn update_status(
    conn: &Connection,
    id: i64,
    status: FeedbackStatus,
    note: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Feedback, DbError> {
    let changed = conn.execute(
        "UPDATE feedback SET status = ?2, admin_note = COALESCE(?3, admin_note), updated_at = ?4
         WHERE id = ?1",
        params![id, status, note, now],
    )?;
    if changed == 0 {
        return Err(DbError::NotFound("feedback"));
    }
    find(conn, id)
}
