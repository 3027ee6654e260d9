//! Users, their roles and sessions.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::search_term;
use crate::auth::Role;
use crate::database::models::{PageRequest, User, UserCredentials, UserWithRoles};
use crate::database::DbError;

const USER_COLUMNS: &str = "id, email, display_name, phone, blocked, created_at";

fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        display_name: row.get(2)?,
        phone: row.get(3)?,
        blocked: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub fn insert_user(
    conn: &Connection,
    email: &str,
    password_hash: &str,
    display_name: &str,
    phone: Option<&str>,
    now: DateTime<Utc>,
) -> Result<i64, DbError> {
    conn.execute(
        "INSERT INTO users (email, password_hash, display_name, phone, blocked, created_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5)",
        params![email, password_hash, display_name, phone, now],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn count_users(conn: &Connection) -> Result<i64, DbError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
}

pub fn find_user(conn: &Connection, id: i64) -> Result<User, DbError> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        [id],
        map_user,
    )
    .optional()?
    .ok_or(DbError::NotFound("user"))
}

pub fn credentials_by_email(
    conn: &Connection,
    email: &str,
) -> Result<Option<UserCredentials>, DbError> {
    Ok(conn
        .query_row(
            "SELECT id, password_hash, blocked FROM users WHERE email = ?1",
            [email],
            |row| {
                Ok(UserCredentials {
                    id: row.get(0)?,
                    password_hash: row.get(1)?,
                    blocked: row.get(2)?,
                })
            },
        )
        .optional()?)
}

pub fn password_hash(conn: &Connection, id: i64) -> Result<String, DbError> {
    conn.query_row(
        "SELECT password_hash FROM users WHERE id = ?1",
        [id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or(DbError::NotFound("user"))
}

pub fn update_password(conn: &Connection, id: i64, password_hash: &str) -> Result<(), DbError> {
    let changed = conn.execute(
        "UPDATE users SET password_hash = ?2 WHERE id = ?1",
        params![id, password_hash],
    )?;
    if changed == 0 {
        return Err(DbError::NotFound("user"));
    }
    Ok(())
}

pub fn set_blocked(conn: &Connection, id: i64, blocked: bool) -> Result<(), DbError> {
    let changed = conn.execute(
        "UPDATE users SET blocked = ?2 WHERE id = ?1",
        params![id, blocked],
    )?;
    if changed == 0 {
        return Err(DbError::NotFound("user"));
    }
    if blocked {
        conn.execute("DELETE FROM sessions WHERE user_id = ?1", [id])?;
    }
    Ok(())
}

pub fn update_profile(
    conn: &Connection,
    id: i64,
    display_name: &str,
    phone: Option<&str>,
) -> Result<User, DbError> {
    let changed = conn.execute(
        "UPDATE users SET display_name = ?2, phone = ?3 WHERE id = ?1",
        params![id, display_name, phone],
    )?;
    if changed == 0 {
        return Err(DbError::NotFound("user"));
    }
    find_user(conn, id)
}

pub fn roles_of(conn: &Connection, user_id: i64) -> Result<Vec<Role>, DbError> {
    let mut stmt = conn.prepare("SELECT role FROM user_roles WHERE user_id = ?1")?;
    let names = stmt
        .query_map([user_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(crate::auth::rbac::parse_roles(names.iter().map(String::as_str)))
}

pub fn grant_role(
    conn: &Connection,
    user_id: i64,
    role: Role,
    now: DateTime<Utc>,
) -> Result<(), DbError> {
    conn.execute(
        "INSERT OR IGNORE INTO user_roles (user_id, role, granted_at) VALUES (?1, ?2, ?3)",
        params![user_id, role, now],
    )?;
    Ok(())
}

pub fn revoke_role(conn: &Connection, user_id: i64, role: Role) -> Result<(), DbError> {
    conn.execute(
        "DELETE FROM user_roles WHERE user_id = ?1 AND role = ?2",
        params![user_id, role],
    )?;
    Ok(())
}

pub fn with_roles(conn: &Connection, user: User) -> Result<UserWithRoles, DbError> {
    let roles = roles_of(conn, user.id)?;
    Ok(UserWithRoles { user, roles })
}

pub fn search_users(
    conn: &Connection,
    q: Option<&str>,
    page: PageRequest,
) -> Result<(Vec<UserWithRoles>, i64), DbError> {
    let pattern = search_term(q);
    let filter = "(?1 IS NULL OR fold_case(email) LIKE ?1 ESCAPE '\\' OR fold_case(display_name) LIKE ?1 ESCAPE '\\')";

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM users WHERE {filter}"),
        params![pattern],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE {filter} ORDER BY id LIMIT ?2 OFFSET ?3"
    ))?;
    let users = stmt
        .query_map(params![pattern, page.limit(), page.offset()], map_user)?
        .collect::<Result<Vec<_>, _>>()?;

    let items = users
        .into_iter()
        .map(|user| with_roles(conn, user))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((items, total))
}

/// Emails of active users holding any of `roles`.
pub fn emails_with_roles(conn: &Connection, roles: &[Role]) -> Result<Vec<String>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT u.email FROM users u JOIN user_roles r ON r.user_id = u.id
         WHERE r.role = ?1 AND u.blocked = 0",
    )?;
    let mut emails = Vec::new();
    for role in roles {
        for email in stmt.query_map([role], |row| row.get::<_, String>(0))? {
            let email = email?;
            if !emails.contains(&email) {
                emails.push(email);
            }
        }
    }
    Ok(emails)
}

pub fn insert_session(
    conn: &Connection,
    token_hash: &str,
    user_id: i64,
    now: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO sessions (token_hash, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
        params![token_hash, user_id, now, expires_at],
    )?;
    Ok(())
}

/// Owner and expiry of the session with `token_hash`, if it exists.
pub fn find_session(
    conn: &Connection,
    token_hash: &str,
) -> Result<Option<(i64, DateTime<Utc>)>, DbError> {
    Ok(conn
        .query_row(
            "SELECT user_id, expires_at FROM sessions WHERE token_hash = ?1",
            [token_hash],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?)
}

pub fn delete_session(conn: &Connection, token_hash: &str) -> Result<(), DbError> {
    conn.execute("DELETE FROM sessions WHERE token_hash = ?1", [token_hash])?;
    Ok(())
}

/// Drops every session of `user_id` except `keep`.
pub fn delete_other_sessions(
    conn: &Connection,
    user_id: i64,
    keep: Option<&str>,
) -> Result<usize, DbError> {
    Ok(conn.execute(
        "DELETE FROM sessions WHERE user_id = ?1 AND (?2 IS NULL OR token_hash <> ?2)",
        params![user_id, keep],
    )?)
}

pub fn purge_expired_sessions(conn: &Connection, now: DateTime<Utc>) -> Result<usize, DbError> {
    Ok(conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", [now])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_connection;
    use chrono::Duration;

    fn seed(conn: &Connection, email: &str) -> i64 {
        insert_user(conn, email, "hash", "Name", None, Utc::now()).unwrap()
    }

    #[test]
    fn duplicate_email_conflicts() {
        let conn = test_connection();
        seed(&conn, "a@example.org");
        let err = insert_user(&conn, "a@example.org", "h", "n", None, Utc::now()).unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
    }

    #[test]
    fn roles_roundtrip() {
        let conn = test_connection();
        let id = seed(&conn, "a@example.org");
        grant_role(&conn, id, Role::Editor, Utc::now()).unwrap();
        grant_role(&conn, id, Role::Editor, Utc::now()).unwrap();
        grant_role(&conn, id, Role::Owner, Utc::now()).unwrap();
        assert_eq!(roles_of(&conn, id).unwrap(), vec![Role::Editor, Role::Owner]);
        revoke_role(&conn, id, Role::Editor).unwrap();
        assert_eq!(roles_of(&conn, id).unwrap(), vec![Role::Owner]);
    }

    #[test]
    fn sessions_expire_and_purge() {
        let conn = test_connection();
        let id = seed(&conn, "a@example.org");
        let now = Utc::now();
        insert_session(&conn, "old", id, now, now - Duration::minutes(1)).unwrap();
        insert_session(&conn, "new", id, now, now + Duration::hours(1)).unwrap();
        assert_eq!(purge_expired_sessions(&conn, now).unwrap(), 1);
        assert!(find_session(&conn, "old").unwrap().is_none());
        assert_eq!(find_session(&conn, "new").unwrap().map(|s| s.0), Some(id));
    }

    #[test]
    fn blocking_drops_sessions() {
        let conn = test_connection();
        let id = seed(&conn, "a@example.org");
        let now = Utc::now();
        insert_session(&conn, "t", id, now, now + Duration::hours(1)).unwrap();
        set_blocked(&conn, id, true).unwrap();
        assert!(find_session(&conn, "t").unwrap().is_none());
        assert!(find_user(&conn, id).unwrap().blocked);
    }

    #[test]
    fn searches_by_email_or_name() {
        let conn = test_connection();
        seed(&conn, "anna@example.org");
        seed(&conn, "boris@example.org");
        let (items, total) = search_users(&conn, Some("ANNA"), PageRequest::default()).unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].user.email, "anna@example.org");
        let (_, total) = search_users(&conn, None, PageRequest::default()).unwrap();
        assert_eq!(total, 2);
    }
}
