//! News, events and announcements.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;

use super::search_term;
use crate::database::models::{
    PageRequest, Publication, PublicationKind, PublicationStatus,
};
use crate::database::DbError;

const COLUMNS: &str = "id, kind, title, slug, content, excerpt, status, pinned, cover_media_id,
    event_start, event_end, event_location, author_id, published_at, created_at, updated_at";

/// Stored fields of a publication, with the derived slug, excerpt and search text.
#[derive(Debug, Clone)]
pub struct PublicationRecord {
    pub kind: PublicationKind,
    pub title: String,
    pub content: Value,
    pub excerpt: String,
    pub body_text: String,
    pub pinned: bool,
    pub cover_media_id: Option<i64>,
    pub event_start: Option<DateTime<Utc>>,
    pub event_end: Option<DateTime<Utc>>,
    pub event_location: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PublicationFilter<'a> {
    pub kind: Option<PublicationKind>,
    pub status: Option<PublicationStatus>,
    pub q: Option<&'a str>,
}

fn map_publication(row: &Row<'_>) -> rusqlite::Result<Publication> {
    let content: String = row.get(4)?;
    Ok(Publication {
        id: row.get(0)?,
        kind: row.get(1)?,
        title: row.get(2)?,
        slug: row.get(3)?,
        content: serde_json::from_str(&content).unwrap_or(Value::Null),
        excerpt: row.get(5)?,
        status: row.get(6)?,
        pinned: row.get(7)?,
        cover_media_id: row.get(8)?,
        event_start: row.get(9)?,
        event_end: row.get(10)?,
        event_location: row.get(11)?,
        author_id: row.get(12)?,
        published_at: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

pub fn slug_taken(conn: &Connection, slug: &str) -> Result<bool, DbError> {
    Ok(conn
        .query_row("SELECT 1 FROM publications WHERE slug = ?1", [slug], |_| Ok(()))
        .optional()?
        .is_some())
}

/// Inserts a draft.
pub fn insert(
    conn: &Connection,
    record: &PublicationRecord,
    slug: &str,
    author_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<Publication, DbError> {
    conn.execute(
        "INSERT INTO publications (kind, title, slug, content, excerpt, body_text, status, pinned,
             cover_media_id, event_start, event_end, event_location, author_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)",
        params![
            record.kind,
            record.title,
            slug,
            record.content.to_string(),
            record.excerpt,
            record.body_text,
            PublicationStatus::Draft,
            record.pinned,
            record.cover_media_id,
            record.event_start,
            record.event_end,
            record.event_location,
            author_id,
            now
        ],
    )?;
    find(conn, conn.last_insert_rowid())
}

/// Replaces the editable fields. The slug stays stable so shared links keep working.
pub fn update(
    conn: &Connection,
    id: i64,
    record: &PublicationRecord,
    now: DateTime<Utc>,
) -> Result<Publication, DbError> {
    let changed = conn.execute(
        "UPDATE publications SET kind = ?2, title = ?3, content = ?4, excerpt = ?5, body_text = ?6,
             pinned = ?7, cover_media_id = ?8, event_start = ?9, event_end = ?10,
             event_location = ?11, updated_at = ?12
         WHERE id = ?1",
        params![
            id,
            record.kind,
            record.title,
            record.content.to_string(),
            record.excerpt,
            record.body_text,
            record.pinned,
            record.cover_media_id,
            record.event_start,
            record.event_end,
            record.event_location,
            now
        ],
    )?;
    if changed == 0 {
        return Err(DbError::NotFound("publication"));
    }
    find(conn, id)
}

/// Moves a publication to `status`; the first publication stamps `published_at`.
pub fn set_status(
    conn: &Connection,
    id: i64,
    status: PublicationStatus,
    now: DateTime<Utc>,
) -> Result<Publication, DbError> {
    let changed = conn.execute(
        "UPDATE publications
         SET status = ?2,
             published_at = CASE WHEN ?2 = 'published' THEN COALESCE(published_at, ?3)
                                 ELSE published_at END,
             updated_at = ?3
         WHERE id = ?1",
        params![id, status, now],
    )?;
    if changed == 0 {
        return Err(DbError::NotFound("publication"));
    }
    find(conn, id)
}

pub fn delete(conn: &Connection, id: i64) -> Result<(), DbError> {
    let changed = conn.execute("DELETE FROM publications WHERE id = ?1", [id])?;
    if changed == 0 {
        return Err(DbError::NotFound("publication"));
    }
    Ok(())
}

pub fn find(conn: &Connection, id: i64) -> Result<Publication, DbError> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM publications WHERE id = ?1"),
        [id],
        map_publication,
    )
    .optional()?
    .ok_or(DbError::NotFound("publication"))
}

pub fn find_published(conn: &Connection, slug: &str) -> Result<Publication, DbError> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM publications WHERE slug = ?1 AND status = 'published'"),
        [slug],
        map_publication,
    )
    .optional()?
    .ok_or(DbError::NotFound("publication"))
}

/// Pinned first, then newest.
pub fn list(
    conn: &Connection,
    filter: &PublicationFilter<'_>,
    page: PageRequest,
) -> Result<(Vec<Publication>, i64), DbError> {
    const WHERE: &str = "(?1 IS NULL OR kind = ?1)
        AND (?2 IS NULL OR status = ?2)
        AND (?3 IS NULL OR fold_case(title) LIKE ?3 ESCAPE '\\' OR fold_case(body_text) LIKE ?3 ESCAPE '\\')";

    let q = search_term(filter.q);
    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM publications WHERE {WHERE}"),
        params![filter.kind, filter.status, q],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM publications WHERE {WHERE}
         ORDER BY pinned DESC, COALESCE(published_at, created_at) DESC, id DESC
         LIMIT ?4 OFFSET ?5"
    ))?;
    let rows = stmt.query_map(
        params![filter.kind, filter.status, q, page.limit(), page.offset()],
        map_publication,
    )?;
    Ok((rows.collect::<Result<Vec<_>, _>>()?, total))
}

/// Published events that have not ended yet, soonest first.
pub fn upcoming_events(
    conn: &Connection,
    now: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<Publication>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM publications
         WHERE kind = 'event' AND status = 'published' AND event_start IS NOT NULL
           AND COALESCE(event_end, event_start) >= ?1
         ORDER BY event_start, id LIMIT ?2"
    ))?;
    let rows = stmt.query_map(params![now, limit], map_publication)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_connection;
    use chrono::Duration;
    use serde_json::json;

    fn record(kind: PublicationKind, title: &str, body: &str) -> PublicationRecord {
        PublicationRecord {
            kind,
            title: title.to_string(),
            content: json!({"type": "doc", "content": [{"type": "text", "text": body}]}),
            excerpt: body.to_string(),
            body_text: body.to_string(),
            pinned: false,
            cover_media_id: None,
            event_start: None,
            event_end: None,
            event_location: None,
        }
    }

    #[test]
    fn publishing_stamps_once() {
        let conn = test_connection();
        let draft = insert(&conn, &record(PublicationKind::News, "Lift", "Lift repair"), "lift", None, Utc::now())
            .unwrap();
        assert_eq!(draft.status, PublicationStatus::Draft);
        assert!(draft.published_at.is_none());

        let first = Utc::now() - Duration::days(1);
        let published = set_status(&conn, draft.id, PublicationStatus::Published, first).unwrap();
        assert_eq!(published.published_at, Some(first));

        set_status(&conn, draft.id, PublicationStatus::Draft, Utc::now()).unwrap();
        let again = set_status(&conn, draft.id, PublicationStatus::Published, Utc::now()).unwrap();
        assert_eq!(again.published_at, Some(first));
    }

    #[test]
    fn public_listing_orders_pinned_first() {
        let conn = test_connection();
        let now = Utc::now();
        let older = insert(&conn, &record(PublicationKind::News, "Old", "Water"), "old", None, now).unwrap();
        let newer = insert(&conn, &record(PublicationKind::News, "New", "Heating"), "new", None, now).unwrap();
        let hidden = insert(&conn, &record(PublicationKind::News, "Draft", "Water"), "draft", None, now).unwrap();
        set_status(&conn, older.id, PublicationStatus::Published, now - Duration::days(2)).unwrap();
        set_status(&conn, newer.id, PublicationStatus::Published, now).unwrap();
        conn.execute("UPDATE publications SET pinned = 1 WHERE id = ?1", [older.id])
            .unwrap();

        let filter = PublicationFilter {
            status: Some(PublicationStatus::Published),
            ..Default::default()
        };
        let (items, total) = list(&conn, &filter, PageRequest::default()).unwrap();
        assert_eq!(total, 2);
        assert_eq!(items[0].id, older.id);
        assert_eq!(items[1].id, newer.id);

        let filter = PublicationFilter {
            status: Some(PublicationStatus::Published),
            q: Some("WATER"),
            ..Default::default()
        };
        let (items, _) = list(&conn, &filter, PageRequest::default()).unwrap();
        assert_eq!(items.len(), 1);
        assert!(items.iter().all(|p| p.id != hidden.id));
        assert!(matches!(find_published(&conn, "draft"), Err(DbError::NotFound(_))));
    }

    #[test]
    fn search_folds_non_ascii_case() {
        let conn = test_connection();
        let now = Utc::now();
        let water = insert(
            &conn,
            &record(PublicationKind::News, "Отключение воды", "Плановые работы"),
            "otkliuchenie-vody",
            None,
            now,
        )
        .unwrap();
        set_status(&conn, water.id, PublicationStatus::Published, now).unwrap();

        for q in ["отключение", "Отключение", "ВОДЫ", "плановые"] {
            let filter = PublicationFilter {
                status: Some(PublicationStatus::Published),
                q: Some(q),
                ..Default::default()
            };
            let (items, total) = list(&conn, &filter, PageRequest::default()).unwrap();
            assert_eq!(total, 1, "{q}");
            assert_eq!(items[0].id, water.id);
        }
    }

    #[test]
    fn upcoming_skips_finished_events() {
        let conn = test_connection();
        let now = Utc::now();
        let mut past = record(PublicationKind::Event, "Past", "");
        past.event_start = Some(now - Duration::days(3));
        past.event_end = Some(now - Duration::days(2));
        let mut soon = record(PublicationKind::Event, "Soon", "");
        soon.event_start = Some(now + Duration::days(1));

        for (rec, slug) in [(&past, "past"), (&soon, "soon")] {
            let p = insert(&conn, rec, slug, None, now).unwrap();
            set_status(&conn, p.id, PublicationStatus::Published, now).unwrap();
        }
        let events = upcoming_events(&conn, now, 10).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].slug, "soon");
    }
}
