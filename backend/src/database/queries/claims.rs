//! Property claims and the ownership links created when they are approved.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::property::{label_sql, property_exists};
use super::users;
use crate::database::models::{
    Claim, ClaimRelation, ClaimStatus, PageRequest, PropertyKind, PropertyLink,
};
use crate::database::DbError;

static CLAIM_SELECT: Lazy<String> = Lazy::new(|| {
    format!(
        "SELECT c.id, c.user_id, c.property_kind, c.property_id, {}, c.relation, c.comment,
                c.status, c.admin_comment, c.reviewed_by, c.created_at, c.reviewed_at
         FROM claims c",
        label_sql("c.property_kind", "c.property_id")
    )
});

fn map_claim(row: &Row<'_>) -> rusqlite::Result<Claim> {
    Ok(Claim {
        id: row.get(0)?,
        user_id: row.get(1)?,
        property_kind: row.get(2)?,
        property_id: row.get(3)?,
        property_label: row.get(4)?,
        relation: row.get(5)?,
        comment: row.get(6)?,
        status: row.get(7)?,
        admin_comment: row.get(8)?,
        reviewed_by: row.get(9)?,
        created_at: row.get(10)?,
        reviewed_at: row.get(11)?,
    })
}

#[derive(Debug, Clone)]
pub struct NewClaim {
    pub user_id: i64,
    pub property_kind: PropertyKind,
    pub property_id: i64,
    pub relation: ClaimRelation,
    pub comment: Option<String>,
}

pub fn insert(conn: &Connection, claim: &NewClaim, now: DateTime<Utc>) -> Result<Claim, DbError> {
    if !property_exists(conn, claim.property_kind, claim.property_id)? {
        return Err(DbError::NotFound("property"));
    }

    let active: i64 = conn.query_row(
        "SELECT COUNT(*) FROM claims
         WHERE user_id = ?1 AND property_kind = ?2 AND property_id = ?3
           AND status IN ('pending', 'approved')",
        params![claim.user_id, claim.property_kind, claim.property_id],
        |row| row.get(0),
    )?;
    if active > 0 {
        return Err(DbError::Conflict(
            "You already have an active claim for this property".to_string(),
        ));
    }

    conn.execute(
        "INSERT INTO claims (user_id, property_kind, property_id, relation, comment, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            claim.user_id,
            claim.property_kind,
            claim.property_id,
            claim.relation,
            claim.comment,
            ClaimStatus::Pending,
            now
        ],
    )?;
    find(conn, conn.last_insert_rowid())
}

pub fn find(conn: &Connection, id: i64) -> Result<Claim, DbError> {
    conn.query_row(&format!("{} WHERE c.id = ?1", *CLAIM_SELECT), [id], map_claim)
        .optional()?
        .ok_or(DbError::NotFound("claim"))
}

pub fn list_for_user(conn: &Connection, user_id: i64) -> Result<Vec<Claim>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE c.user_id = ?1 ORDER BY c.id DESC",
        *CLAIM_SELECT
    ))?;
    let rows = stmt.query_map([user_id], map_claim)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Claims for the review queue, oldest first so the queue drains in order.
pub fn list_by_status(
    conn: &Connection,
    status: Option<ClaimStatus>,
    page: PageRequest,
) -> Result<(Vec<Claim>, i64), DbError> {
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM claims WHERE ?1 IS NULL OR status = ?1",
        params![status],
        |row| row.get(0),
    )?;
    let mut stmt = conn.prepare(&format!(
        "{} WHERE ?1 IS NULL OR c.status = ?1 ORDER BY c.created_at, c.id LIMIT ?2 OFFSET ?3",
        *CLAIM_SELECT
    ))?;
    let rows = stmt.query_map(params![status, page.limit(), page.offset()], map_claim)?;
    Ok((rows.collect::<Result<Vec<_>, _>>()?, total))
}

fn ensure_pending(claim: &Claim) -> Result<(), DbError> {
    if claim.status == ClaimStatus::Pending {
        Ok(())
    } else {
        Err(DbError::Conflict(format!(
            "Claim is already {}",
            claim.status
        )))
    }
}

fn close(
    conn: &Connection,
    id: i64,
    status: ClaimStatus,
    reviewer: Option<i64>,
    admin_comment: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), DbError> {
    conn.execute(
        "UPDATE claims SET status = ?2, reviewed_by = ?3, admin_comment = ?4, reviewed_at = ?5
         WHERE id = ?1",
        params![id, status, reviewer, admin_comment, now],
    )?;
    Ok(())
}

/// Approves a pending claim, grants the matching role and links the unit to the user.
///
/// Issues several writes; run it inside the caller's transaction.
pub fn approve(
    conn: &Connection,
    id: i64,
    reviewer: i64,
    admin_comment: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Claim, DbError> {
    let claim = find(conn, id)?;
    ensure_pending(&claim)?;

    close(conn, id, ClaimStatus::Approved, Some(reviewer), admin_comment, now)?;
    users::grant_role(conn, claim.user_id, claim.relation.granted_role(), now)?;
    conn.execute(
        "INSERT OR REPLACE INTO property_links
             (user_id, property_kind, property_id, relation, claim_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            claim.user_id,
            claim.property_kind,
            claim.property_id,
            claim.relation,
            claim.id,
            now
        ],
    )?;

    find(conn, id)
}

pub fn reject(
    conn: &Connection,
    id: i64,
    reviewer: i64,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<Claim, DbError> {
    let claim = find(conn, id)?;
    ensure_pending(&claim)?;
    close(conn, id, ClaimStatus::Rejected, Some(reviewer), Some(reason), now)?;
    find(conn, id)
}

/// Withdraws a pending claim. Authorship is checked by the caller.
pub fn cancel(conn: &Connection, id: i64, now: DateTime<Utc>) -> Result<Claim, DbError> {
    let claim = find(conn, id)?;
    ensure_pending(&claim)?;
    close(conn, id, ClaimStatus::Cancelled, None, None, now)?;
    find(conn, id)
}

pub fn links_for_user(conn: &Connection, user_id: i64) -> Result<Vec<PropertyLink>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT l.property_kind, l.property_id, {}, l.relation, l.created_at
         FROM property_links l WHERE l.user_id = ?1
         ORDER BY l.property_kind, l.created_at",
        label_sql("l.property_kind", "l.property_id")
    ))?;
    let rows = stmt.query_map([user_id], |row| {
        Ok(PropertyLink {
            property_kind: row.get(0)?,
            property_id: row.get(1)?,
            property_label: row.get(2)?,
            relation: row.get(3)?,
            since: row.get(4)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::database::queries::property::fixtures;
    use crate::database::test_connection;

    fn claimant(conn: &Connection) -> i64 {
        users::insert_user(conn, "anna@example.com", "x", "Anna", None, Utc::now()).unwrap()
    }

    fn new_claim(user_id: i64, property_id: i64) -> NewClaim {
        NewClaim {
            user_id,
            property_kind: PropertyKind::Apartment,
            property_id,
            relation: ClaimRelation::Owner,
            comment: Some("Bought in 2021".to_string()),
        }
    }

    #[test]
    fn one_active_claim_per_property() {
        let conn = test_connection();
        let apartment = fixtures::apartment(&conn);
        let user = claimant(&conn);

        let claim = insert(&conn, &new_claim(user, apartment), Utc::now()).unwrap();
        assert_eq!(claim.status, ClaimStatus::Pending);
        assert_eq!(claim.property_label.as_deref(), Some("Building 2, apt. 41"));
        assert!(matches!(
            insert(&conn, &new_claim(user, apartment), Utc::now()),
            Err(DbError::Conflict(_))
        ));

        cancel(&conn, claim.id, Utc::now()).unwrap();
        insert(&conn, &new_claim(user, apartment), Utc::now()).unwrap();
    }

    #[test]
    fn unknown_property_is_not_found() {
        let conn = test_connection();
        let user = claimant(&conn);
        assert!(matches!(
            insert(&conn, &new_claim(user, 404), Utc::now()),
            Err(DbError::NotFound("property"))
        ));
    }

    #[test]
    fn approval_grants_role_and_link() {
        let conn = test_connection();
        let apartment = fixtures::apartment(&conn);
        let user = claimant(&conn);
        let reviewer =
            users::insert_user(&conn, "admin@example.com", "x", "Admin", None, Utc::now()).unwrap();
        let claim = insert(&conn, &new_claim(user, apartment), Utc::now()).unwrap();

        let approved = approve(&conn, claim.id, reviewer, None, Utc::now()).unwrap();
        assert_eq!(approved.status, ClaimStatus::Approved);
        assert_eq!(approved.reviewed_by, Some(reviewer));
        assert_eq!(users::roles_of(&conn, user).unwrap(), vec![Role::Owner]);

        let links = links_for_user(&conn, user).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].property_id, apartment);

        assert!(matches!(
            reject(&conn, claim.id, reviewer, "late", Utc::now()),
            Err(DbError::Conflict(_))
        ));
    }

    #[test]
    fn approval_rolls_back_with_its_transaction() {
        let mut conn = test_connection();
        let apartment = fixtures::apartment(&conn);
        let user = claimant(&conn);
        let claim = insert(&conn, &new_claim(user, apartment), Utc::now()).unwrap();

        {
            let tx = conn.transaction().unwrap();
            approve(&tx, claim.id, user, None, Utc::now()).unwrap();
        }

        assert_eq!(find(&conn, claim.id).unwrap().status, ClaimStatus::Pending);
        assert!(users::roles_of(&conn, user).unwrap().is_empty());
        assert!(links_for_user(&conn, user).unwrap().is_empty());
    }

    #[test]
    fn review_queue_filters_by_status() {
        let conn = test_connection();
        let apartment = fixtures::apartment(&conn);
        let user = claimant(&conn);
        let claim = insert(&conn, &new_claim(user, apartment), Utc::now()).unwrap();
        reject(&conn, claim.id, user, "No documents", Utc::now()).unwrap();

        let (pending, total) =
            list_by_status(&conn, Some(ClaimStatus::Pending), PageRequest::default()).unwrap();
        assert!(pending.is_empty());
        assert_eq!(total, 0);

        let (all, total) = list_by_status(&conn, None, PageRequest::default()).unwrap();
        assert_eq!(total, 1);
        assert_eq!(all[0].admin_comment.as_deref(), Some("No documents"));
    }
}
