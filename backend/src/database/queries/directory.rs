//! Directory of useful contacts (management company, emergency services, shops).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::search_term;
use crate::database::models::{DirectoryContact, DirectoryEntry};
use crate::database::DbError;

#[derive(Debug, Clone)]
pub struct EntryFields {
    pub title: String,
    pub category: String,
    pub description: String,
    pub sort_order: i64,
    pub active: bool,
}

const COLUMNS: &str = "id, title, category, description, sort_order, active, created_at, updated_at";

fn map_entry(row: &Row<'_>) -> rusqlite::Result<DirectoryEntry> {
    Ok(DirectoryEntry {
        id: row.get(0)?,
        title: row.get(1)?,
        category: row.get(2)?,
        description: row.get(3)?,
        sort_order: row.get(4)?,
        active: row.get(5)?,
        contacts: Vec::new(),
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn contacts_of(conn: &Connection, entry_id: i64) -> Result<Vec<DirectoryContact>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT kind, value, label FROM directory_contacts WHERE entry_id = ?1 ORDER BY position",
    )?;
    let rows = stmt.query_map([entry_id], |row| {
        Ok(DirectoryContact {
            kind: row.get(0)?,
            value: row.get(1)?,
            label: row.get(2)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn write_contacts(
    conn: &Connection,
    entry_id: i64,
    contacts: &[DirectoryContact],
) -> Result<(), DbError> {
    conn.execute("DELETE FROM directory_contacts WHERE entry_id = ?1", [entry_id])?;
    let mut stmt = conn.prepare(
        "INSERT INTO directory_contacts (entry_id, kind, value, label, position)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for (position, contact) in contacts.iter().enumerate() {
        stmt.execute(params![
            entry_id,
            contact.kind,
            contact.value,
            contact.label,
            position as i64
        ])?;
    }
    Ok(())
}

pub fn find(conn: &Connection, id: i64) -> Result<DirectoryEntry, DbError> {
    let mut entry = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM directory_entries WHERE id = ?1"),
            [id],
            map_entry,
        )
        .optional()?
        .ok_or(DbError::NotFound("directory entry"))?;
    entry.contacts = contacts_of(conn, id)?;
    Ok(entry)
}

/// Writes the entry and its contacts; run it inside the caller's transaction.
pub fn insert(
    conn: &Connection,
    fields: &EntryFields,
    contacts: &[DirectoryContact],
    now: DateTime<Utc>,
) -> Result<DirectoryEntry, DbError> {
    conn.execute(
        "INSERT INTO directory_entries (title, category, description, sort_order, active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            fields.title,
            fields.category,
            fields.description,
            fields.sort_order,
            fields.active,
            now
        ],
    )?;
    let id = conn.last_insert_rowid();
    write_contacts(conn, id, contacts)?;
    find(conn, id)
}

pub fn update(
    conn: &Connection,
    id: i64,
    fields: &EntryFields,
    now: DateTime<Utc>,
) -> Result<DirectoryEntry, DbError> {
    let changed = conn.execute(
        "UPDATE directory_entries
         SET title = ?2, category = ?3, description = ?4, sort_order = ?5, active = ?6, updated_at = ?7
         WHERE id = ?1",
        params![
            id,
            fields.title,
            fields.category,
            fields.description,
            fields.sort_order,
            fields.active,
            now
        ],
    )?;
    if changed == 0 {
        return Err(DbError::NotFound("directory entry"));
    }
    find(conn, id)
}

/// Swaps the whole contact list of an entry, keeping the given order. Run it inside
/// the caller's transaction.
pub fn replace_contacts(
    conn: &Connection,
    id: i64,
    contacts: &[DirectoryContact],
    now: DateTime<Utc>,
) -> Result<DirectoryEntry, DbError> {
    let changed = conn.execute(
        "UPDATE directory_entries SET updated_at = ?2 WHERE id = ?1",
        params![id, now],
    )?;
    if changed == 0 {
        return Err(DbError::NotFound("directory entry"));
    }
    write_contacts(conn, id, contacts)?;
    find(conn, id)
}

pub fn delete(conn: &Connection, id: i64) -> Result<(), DbError> {
    let changed = conn.execute("DELETE FROM directory_entries WHERE id = ?1", [id])?;
    if changed == 0 {
        return Err(DbError::NotFound("directory entry"));
    }
    Ok(())
}

/// Entries ordered by category, sort order and title. `q` matches title, description,
/// category and contact values.
pub fn list(
    conn: &Connection,
    active_only: bool,
    q: Option<&str>,
) -> Result<Vec<DirectoryEntry>, DbError> {
    let q = search_term(q);
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM directory_entries e
         WHERE (?1 = 0 OR e.active = 1)
           AND (?2 IS NULL
                OR fold_case(e.title) LIKE ?2 ESCAPE '\\'
                OR fold_case(e.description) LIKE ?2 ESCAPE '\\'
                OR fold_case(e.category) LIKE ?2 ESCAPE '\\'
                OR EXISTS (SELECT 1 FROM directory_contacts c
                           WHERE c.entry_id = e.id AND fold_case(c.value) LIKE ?2 ESCAPE '\\'))
         ORDER BY e.category, e.sort_order, e.title"
    ))?;
    let mut entries = stmt
        .query_map(params![active_only, q], map_entry)?
        .collect::<Result<Vec<_>, _>>()?;

    let mut contacts: HashMap<i64, Vec<DirectoryContact>> = HashMap::new();
    let mut stmt = conn.prepare(
        "SELECT entry_id, kind, value, label FROM directory_contacts ORDER BY entry_id, position",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            DirectoryContact {
                kind: row.get(1)?,
                value: row.get(2)?,
                label: row.get(3)?,
            },
        ))
    })?;
    for row in rows {
        let (entry_id, contact) = row?;
        contacts.entry(entry_id).or_default().push(contact);
    }
    for entry in &mut entries {
        entry.contacts = contacts.remove(&entry.id).unwrap_or_default();
    }
    Ok(entries)
}
