//! Handler functions for the directory.
//!
//! The public view groups active entries by category. Staff with the `directory`
//! feature edit entries and replace their contact lists wholesale.

use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::extract::{Json, Path, Query};
use crate::api::{required, with_db, with_tx};
use crate::auth::{require_feature, AdminFeature, CurrentUser};
use crate::database::models::{ContactKind, DirectoryContact, DirectoryEntry};
use crate::database::queries::directory::{self, EntryFields};
use crate::errors::{AppError, AppResult};
use crate::services::audit;
use crate::state::AppState;

const MAX_CONTACTS: usize = 20;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EntryRequest {
    pub title: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default = "active_by_default")]
    pub active: bool,
    #[serde(default)]
    pub contacts: Vec<DirectoryContact>,
}

fn active_by_default() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct CategoryGroup {
    pub category: String,
    pub entries: Vec<DirectoryEntry>,
}

impl EntryRequest {
    fn fields(&self) -> AppResult<EntryFields> {
        Ok(EntryFields {
            title: required(&self.title, "title")?,
            category: required(&self.category, "category")?,
            description: self.description.trim().to_string(),
            sort_order: self.sort_order,
            active: self.active,
        })
    }
}

/// Trims contact values and checks them against their kind.
pub fn validate_contacts(contacts: Vec<DirectoryContact>) -> AppResult<Vec<DirectoryContact>> {
    if contacts.len() > MAX_CONTACTS {
        return Err(AppError::validation(format!(
            "an entry can have at most {MAX_CONTACTS} contacts"
        )));
    }
    contacts
        .into_iter()
        .map(|contact| {
            let value = contact.value.trim().to_string();
            if value.is_empty() {
                return Err(AppError::validation(format!("{} contact is empty", contact.kind)));
            }
            match contact.kind {
                ContactKind::Email if !value.contains('@') => {
                    return Err(AppError::validation(format!("{value} is not an email address")))
                }
                ContactKind::Website if !value.starts_with("http") => {
                    return Err(AppError::validation("websites must start with http"))
                }
                _ => {}
            }
            Ok(DirectoryContact {
                kind: contact.kind,
                value,
                label: contact
                    .label
                    .map(|l| l.trim().to_string())
                    .filter(|l| !l.is_empty()),
            })
        })
        .collect()
}

/// Groups entries that arrive sorted by category.
pub fn group_by_category(entries: Vec<DirectoryEntry>) -> Vec<CategoryGroup> {
    let mut groups: Vec<CategoryGroup> = Vec::new();
    for entry in entries {
        match groups.last_mut() {
            Some(group) if group.category == entry.category => group.entries.push(entry),
            _ => groups.push(CategoryGroup {
                category: entry.category.clone(),
                entries: vec![entry],
            }),
        }
    }
    groups
}

pub async fn public_directory(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<CategoryGroup>>> {
    let entries =
        with_db(&state, move |conn| Ok(directory::list(conn, true, query.q.as_deref())?)).await?;
    Ok(Json(group_by_category(entries)))
}

pub async fn list_entries(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<DirectoryEntry>>> {
    require_feature(&user, AdminFeature::Directory)?;
    let entries =
        with_db(&state, move |conn| Ok(directory::list(conn, false, query.q.as_deref())?)).await?;
    Ok(Json(entries))
}

pub async fn create_entry(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<EntryRequest>,
) -> AppResult<(StatusCode, Json<DirectoryEntry>)> {
    require_feature(&user, AdminFeature::Directory)?;
    let actor = user.id();
    let fields = request.fields()?;
    let contacts = validate_contacts(request.contacts)?;

    let entry = with_tx(&state, move |conn| {
        let entry = directory::insert(conn, &fields, &contacts, Utc::now())?;
        audit::record(
            conn,
            actor,
            "directory_entry.create",
            "directory_entry",
            Some(entry.id),
            json!({ "title": entry.title, "category": entry.category }),
        )?;
        Ok(entry)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// Updates the entry fields. Contacts are only replaced when the request carries any.
pub async fn update_entry(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(request): Json<EntryRequest>,
) -> AppResult<Json<DirectoryEntry>> {
    require_feature(&user, AdminFeature::Directory)?;
    let actor = user.id();
    let fields = request.fields()?;
    let contacts = validate_contacts(request.contacts)?;

    let entry = with_tx(&state, move |conn| {
        let mut entry = directory::update(conn, id, &fields, Utc::now())?;
        if !contacts.is_empty() {
            entry = directory::replace_contacts(conn, id, &contacts, Utc::now())?;
        }
        audit::record(
            conn,
            actor,
            "directory_entry.update",
            "directory_entry",
            Some(id),
            json!({ "title": entry.title, "active": entry.active }),
        )?;
        Ok(entry)
    })
    .await?;
    Ok(Json(entry))
}

pub async fn replace_contacts(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(contacts): Json<Vec<DirectoryContact>>,
) -> AppResult<Json<DirectoryEntry>> {
    require_feature(&user, AdminFeature::Directory)?;
    let actor = user.id();
    let contacts = validate_contacts(contacts)?;

    let entry = with_tx(&state, move |conn| {
        let entry = directory::replace_contacts(conn, id, &contacts, Utc::now())?;
        audit::record(
            conn,
            actor,
            "directory_entry.contacts",
            "directory_entry",
            Some(id),
            json!({ "contacts": entry.contacts.len() }),
        )?;
        Ok(entry)
    })
    .await?;
    Ok(Json(entry))
}

pub async fn delete_entry(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    require_feature(&user, AdminFeature::Directory)?;
    let actor = user.id();
    with_tx(&state, move |conn| {
        directory::delete(conn, id)?;
        audit::record(conn, actor, "directory_entry.delete", "directory_entry", Some(id), json!({}))?;
        Ok(())
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
