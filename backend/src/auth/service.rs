//! Core business logic for the authentication system.
//!
//! This service handles user creation, password hashing, session issuance and
//! resolution. It orchestrates interactions between the handlers and the database;
//! every function here is synchronous and runs inside `Database::call`.

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use regex::Regex;
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::info;

use super::errors::AuthError;
use super::models::IssuedSession;
use super::rbac::Role;
use crate::database::models::{User, UserWithRoles};
use crate::database::queries::users;
use crate::database::DbError;

const HASH_SCHEME: &str = "pbkdf2-sha256";
const PBKDF2_ROUNDS: u32 = if cfg!(test) { 1_000 } else { 100_000 };
const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;
const SESSION_TOKEN_BYTES: usize = 32;
pub const MIN_PASSWORD_LEN: usize = 8;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));

pub fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    if email.len() > 254 || !EMAIL_RE.is_match(&email) {
        return Err(AuthError::InvalidEmail);
    }
    Ok(email)
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    hash_password_with_rounds(password, PBKDF2_ROUNDS)
}

fn hash_password_with_rounds(password: &str, rounds: u32) -> Result<String, AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword);
    }
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);

    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, rounds, &mut key);

    Ok(format!(
        "{HASH_SCHEME}${rounds}${}${}",
        hex::encode(salt),
        hex::encode(key)
    ))
}

pub fn verify_password(password: &str, stored: &str) -> Result<bool, AuthError> {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(rounds), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return Err(AuthError::Hashing("stored hash is malformed".to_string()));
    };
    if scheme != HASH_SCHEME {
        return Err(AuthError::Hashing(format!("unknown hash scheme {scheme}")));
    }
    let rounds: u32 = rounds
        .parse()
        .map_err(|_| AuthError::Hashing("invalid round count".to_string()))?;
    let salt = hex::decode(salt).map_err(|err| AuthError::Hashing(err.to_string()))?;
    let expected = hex::decode(expected).map_err(|err| AuthError::Hashing(err.to_string()))?;

    let mut key = vec![0u8; expected.len()];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, rounds, &mut key);
    Ok(key.ct_eq(&expected).into())
}

pub fn generate_session_token() -> String {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Sessions are stored by digest so a leaked table does not leak usable tokens.
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

pub struct NewUser<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub display_name: &'a str,
    pub phone: Option<&'a str>,
}

/// Creates the account. The very first account becomes `root`.
pub fn register(
    conn: &mut Connection,
    new_user: NewUser<'_>,
    now: DateTime<Utc>,
) -> Result<UserWithRoles, AuthError> {
    let email = normalize_email(new_user.email)?;
    let display_name = new_user.display_name.trim();
    if display_name.is_empty() {
        return Err(AuthError::DisplayNameRequired);
    }
    let hash = hash_password(new_user.password)?;
    let phone = new_user.phone.map(str::trim).filter(|p| !p.is_empty());

    let tx = conn.transaction().map_err(DbError::from)?;
    let first = users::count_users(&tx)? == 0;
    let id = users::insert_user(&tx, &email, &hash, display_name, phone, now).map_err(
        |err| match err {
            DbError::Conflict(_) => AuthError::EmailTaken,
            other => AuthError::Database(other),
        },
    )?;
    if first {
        users::grant_role(&tx, id, Role::Root, now)?;
        info!(user_id = id, "first account registered as root");
    }
    let user = users::find_user(&tx, id)?;
    let result = users::with_roles(&tx, user)?;
    tx.commit().map_err(DbError::from)?;
    Ok(result)
}

pub fn login(
    conn: &Connection,
    email: &str,
    password: &str,
    now: DateTime<Utc>,
    ttl: Duration,
) -> Result<(IssuedSession, UserWithRoles), AuthError> {
    let email = normalize_email(email).map_err(|_| AuthError::InvalidCredentials)?;
    let Some(credentials) = users::credentials_by_email(conn, &email)? else {
        return Err(AuthError::InvalidCredentials);
    };
    if !verify_password(password, &credentials.password_hash)? {
        return Err(AuthError::InvalidCredentials);
    }
    if credentials.blocked {
        return Err(AuthError::Blocked);
    }

    let session = issue_session(conn, credentials.id, now, ttl)?;
    let user = users::with_roles(conn, users::find_user(conn, credentials.id)?)?;
    Ok((session, user))
}

pub fn issue_session(
    conn: &Connection,
    user_id: i64,
    now: DateTime<Utc>,
    ttl: Duration,
) -> Result<IssuedSession, AuthError> {
    let token = generate_session_token();
    let expires_at = now + ttl;
    users::insert_session(conn, &token_digest(&token), user_id, now, expires_at)?;
    Ok(IssuedSession {
        token,
        user_id,
        expires_at,
    })
}

/// Resolves a raw session token to its user and roles.
pub fn resolve_session(
    conn: &Connection,
    token: &str,
    now: DateTime<Utc>,
) -> Result<(User, Vec<Role>), AuthError> {
    let digest = token_digest(token);
    let Some((user_id, expires_at)) = users::find_session(conn, &digest)? else {
        return Err(AuthError::SessionMissing);
    };
    if expires_at <= now {
        users::delete_session(conn, &digest)?;
        return Err(AuthError::SessionExpired);
    }
    let user = users::find_user(conn, user_id)?;
    if user.blocked {
        return Err(AuthError::Blocked);
    }
    let roles = users::roles_of(conn, user_id)?;
    Ok((user, roles))
}

pub fn logout(conn: &Connection, token: &str) -> Result<(), AuthError> {
    users::delete_session(conn, &token_digest(token))?;
    Ok(())
}

/// Replaces the password and ends every other session of the user.
pub fn change_password(
    conn: &Connection,
    user_id: i64,
    current_token: &str,
    current_password: &str,
    new_password: &str,
) -> Result<(), AuthError> {
    let stored = users::password_hash(conn, user_id)?;
    if !verify_password(current_password, &stored)? {
        return Err(AuthError::InvalidCredentials);
    }
    let hash = hash_password(new_password)?;
    users::update_password(conn, user_id, &hash)?;
    users::delete_other_sessions(conn, user_id, Some(&token_digest(current_token)))?;
    Ok(())
}
