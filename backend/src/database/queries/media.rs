//! Metadata of uploaded files. The bytes live in the media directory.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::database::models::{MediaItem, PageRequest};
use crate::database::DbError;

pub const URL_PREFIX: &str = "/media/";

pub struct NewMedia<'a> {
    pub file_name: &'a str,
    pub original_name: &'a str,
    pub mime: &'a str,
    pub size_bytes: i64,
    pub uploaded_by: Option<i64>,
}

const COLUMNS: &str = "id, file_name, original_name, mime, size_bytes, uploaded_by, created_at";

fn map_media(row: &Row<'_>) -> rusqlite::Result<MediaItem> {
    let file_name: String = row.get(1)?;
    Ok(MediaItem {
        id: row.get(0)?,
        url: format!("{URL_PREFIX}{file_name}"),
        file_name,
        original_name: row.get(2)?,
        mime: row.get(3)?,
        size_bytes: row.get(4)?,
        uploaded_by: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub fn insert(conn: &Connection, media: &NewMedia<'_>, now: DateTime<Utc>) -> Result<MediaItem, DbError> {
    conn.execute(
        "INSERT INTO media (file_name, original_name, mime, size_bytes, uploaded_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            media.file_name,
            media.original_name,
            media.mime,
            media.size_bytes,
            media.uploaded_by,
            now
        ],
    )?;
    find(conn, conn.last_insert_rowid())
}

pub fn find(conn: &Connection, id: i64) -> Result<MediaItem, DbError> {
    conn.query_row(&format!("SELECT {COLUMNS} FROM media WHERE id = ?1"), [id], map_media)
        .optional()?
        .ok_or(DbError::NotFound("media"))
}

pub fn list(conn: &Connection, page: PageRequest) -> Result<(Vec<MediaItem>, i64), DbError> {
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM media", [], |row| row.get(0))?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM media ORDER BY id DESC LIMIT ?1 OFFSET ?2"
    ))?;
    let rows = stmt.query_map(params![page.limit(), page.offset()], map_media)?;
    Ok((rows.collect::<Result<Vec<_>, _>>()?, total))
}

/// Deletes the row and returns it so the caller can remove the file.
pub fn delete(conn: &Connection, id: i64) -> Result<MediaItem, DbError> {
    let item = find(conn, id)?;
    conn.execute("DELETE FROM media WHERE id = ?1", [id])?;
    Ok(item)
}
