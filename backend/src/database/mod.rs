//! Module for database connection setup and common utilities.
//!
//! This module is responsible for opening the SQLite database, applying the schema
//! migrations and handing the connection to async code. All queries are plain
//! synchronous functions over a `rusqlite::Connection` (see [`queries`]); handlers reach
//! them through [`Database::call`], which runs the closure on the blocking pool.

pub mod models;
pub mod queries;

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, ErrorCode};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("Stored value is invalid: {0}")]
    Corrupt(String),

    #[error("Database worker failed: {0}")]
    Worker(String),
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::QueryReturnedNoRows => DbError::NotFound("record"),
            rusqlite::Error::SqliteFailure(code, message)
                if code.code == ErrorCode::ConstraintViolation =>
            {
                DbError::Conflict(describe_constraint(message.as_deref().unwrap_or_default()))
            }
            _ => DbError::Sqlite(err),
        }
    }
}

fn describe_constraint(message: &str) -> String {
    if let Some(columns) = message.strip_prefix("UNIQUE constraint failed: ") {
        format!("A record with the same {columns} already exists")
    } else if message.starts_with("FOREIGN KEY") {
        "The record is still referenced by other records".to_string()
    } else {
        format!("Constraint violated: {message}")
    }
}

/// Ordered schema migrations. Applied versions are recorded in `schema_migrations`.
const MIGRATIONS: &[(i64, &str)] = &[
    (
        1,
        "CREATE TABLE users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            display_name TEXT NOT NULL,
            phone TEXT,
            blocked INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );
        CREATE TABLE user_roles (
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            role TEXT NOT NULL,
            granted_at TEXT NOT NULL,
            PRIMARY KEY (user_id, role)
        );
        CREATE TABLE sessions (
            token_hash TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        );
        CREATE INDEX idx_sessions_user ON sessions(user_id);
        CREATE TABLE settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE TABLE audit_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            actor_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
            action TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id INTEGER,
            details TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX idx_audit_entity ON audit_log(entity_type, created_at);",
    ),
    (
        2,
        "CREATE TABLE buildings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            number TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            address TEXT NOT NULL
        );
        CREATE TABLE entrances (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            building_id INTEGER NOT NULL REFERENCES buildings(id),
            number INTEGER NOT NULL,
            UNIQUE (building_id, number)
        );
        CREATE TABLE floors (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entrance_id INTEGER NOT NULL REFERENCES entrances(id),
            number INTEGER NOT NULL,
            UNIQUE (entrance_id, number)
        );
        CREATE TABLE apartments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            floor_id INTEGER NOT NULL REFERENCES floors(id),
            number TEXT NOT NULL,
            area REAL,
            rooms INTEGER,
            UNIQUE (floor_id, number)
        );
        CREATE TABLE parking_structures (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL UNIQUE,
            address TEXT NOT NULL
        );
        CREATE TABLE parking_floors (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            structure_id INTEGER NOT NULL REFERENCES parking_structures(id),
            number INTEGER NOT NULL,
            UNIQUE (structure_id, number)
        );
        CREATE TABLE parking_spots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            floor_id INTEGER NOT NULL REFERENCES parking_floors(id),
            number TEXT NOT NULL,
            area REAL,
            UNIQUE (floor_id, number)
        );
        CREATE TABLE claims (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            property_kind TEXT NOT NULL,
            property_id INTEGER NOT NULL,
            relation TEXT NOT NULL,
            comment TEXT,
            status TEXT NOT NULL,
            admin_comment TEXT,
            reviewed_by INTEGER REFERENCES users(id) ON DELETE SET NULL,
            created_at TEXT NOT NULL,
            reviewed_at TEXT
        );
        CREATE INDEX idx_claims_status ON claims(status, created_at);
        CREATE INDEX idx_claims_property ON claims(property_kind, property_id);
        CREATE TABLE property_links (
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            property_kind TEXT NOT NULL,
            property_id INTEGER NOT NULL,
            relation TEXT NOT NULL,
            claim_id INTEGER REFERENCES claims(id) ON DELETE SET NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (user_id, property_kind, property_id)
        );",
    ),
    (
        3,
        "CREATE TABLE media (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_name TEXT NOT NULL UNIQUE,
            original_name TEXT NOT NULL,
            mime TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            uploaded_by INTEGER REFERENCES users(id) ON DELETE SET NULL,
            created_at TEXT NOT NULL
        );
        CREATE TABLE publications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            kind TEXT NOT NULL,
            title TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            content TEXT NOT NULL,
            excerpt TEXT NOT NULL,
            body_text TEXT NOT NULL,
            status TEXT NOT NULL,
            pinned INTEGER NOT NULL DEFAULT 0,
            cover_media_id INTEGER REFERENCES media(id) ON DELETE SET NULL,
            event_start TEXT,
            event_end TEXT,
            event_location TEXT,
            author_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
            published_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX idx_publications_listing ON publications(status, kind, pinned, published_at);
        CREATE TABLE directory_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            category TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            sort_order INTEGER NOT NULL DEFAULT 0,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE TABLE directory_contacts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entry_id INTEGER NOT NULL REFERENCES directory_entries(id) ON DELETE CASCADE,
            kind TEXT NOT NULL,
            value TEXT NOT NULL,
            label TEXT,
            position INTEGER NOT NULL
        );
        CREATE INDEX idx_directory_contacts_entry ON directory_contacts(entry_id, position);
        CREATE TABLE feedback (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            phone TEXT,
            category TEXT NOT NULL,
            message TEXT NOT NULL,
            status TEXT NOT NULL,
            admin_note TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX idx_feedback_status ON feedback(status, created_at);",
    ),
];

/// Shared handle over a single SQLite connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(journal_mode = %mode, "opened {}", path.display());
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self, DbError> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update(None, "foreign_keys", true)?;
        register_functions(&conn)?;
        migrate(&mut conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` with exclusive access to the connection on the blocking thread pool.
    pub async fn call<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&mut Connection) -> Result<T, DbError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| DbError::Worker("connection mutex poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|err| DbError::Worker(err.to_string()))?
    }
}

/// Registers `fold_case(text)`, the case folding the search filters use. SQLite's
/// built-in `lower()` and `LIKE` only fold ASCII letters.
pub fn register_functions(conn: &Connection) -> Result<(), DbError> {
    conn.create_scalar_function(
        "fold_case",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|text| text.to_lowercase()))
        },
    )?;
    Ok(())
}

pub fn migrate(conn: &mut Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );",
    )?;

    let current: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    for (version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![version, chrono::Utc::now()],
        )?;
        tx.commit()?;
        info!(version, "applied schema migration");
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn test_connection() -> Connection {
    let mut conn = Connection::open_in_memory().expect("in-memory sqlite");
    conn.pragma_update(None, "foreign_keys", true)
        .expect("enable foreign keys");
    register_functions(&conn).expect("register functions");
    migrate(&mut conn).expect("migrate");
    conn
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let mut conn = test_connection();
        migrate(&mut conn).unwrap();
        let applied: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(applied, MIGRATIONS.len() as i64);
    }

    #[test]
    fn unique_violation_becomes_conflict() {
        let conn = test_connection();
        let insert = "INSERT INTO buildings (number, title, address) VALUES ('1', 'A', 'Street')";
        conn.execute(insert, []).unwrap();
        let err = DbError::from(conn.execute(insert, []).unwrap_err());
        match err {
            DbError::Conflict(message) => assert!(message.contains("buildings.number")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn fold_case_handles_cyrillic() {
        let conn = test_connection();
        let folded: String = conn
            .query_row("SELECT fold_case('Отключение ВОДЫ')", [], |row| row.get(0))
            .unwrap();
        assert_eq!(folded, "отключение воды");
        let null: Option<String> = conn
            .query_row("SELECT fold_case(NULL)", [], |row| row.get(0))
            .unwrap();
        assert_eq!(null, None);
    }

    #[tokio::test]
    async fn call_runs_on_blocking_pool() {
        let db = Database::open_in_memory().unwrap();
        let count: i64 = db
            .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?))
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
