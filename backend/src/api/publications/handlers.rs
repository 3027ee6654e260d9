//! Handler functions for publications.

use axum::extract::State;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::api::extract::{Json, Path, Query};
use crate::api::{optional_text, page_request, required, with_db, with_tx};
use crate::auth::{require_feature, AdminFeature, CurrentUser};
use crate::database::models::{Page, Publication, PublicationKind, PublicationStatus};
use crate::database::queries::media;
use crate::database::queries::publications::{self, PublicationFilter, PublicationRecord};
use crate::database::DbError;
use crate::errors::{AppError, AppResult};
use crate::services::calendar::{self, CalendarEvent};
use crate::services::{audit, content_text, notifications, slug};
use crate::state::AppState;

const MAX_TITLE_CHARS: usize = 200;
const EXCERPT_CHARS: usize = 280;
const DEFAULT_UPCOMING: i64 = 10;
const MAX_UPCOMING: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub kind: Option<PublicationKind>,
    pub status: Option<PublicationStatus>,
    pub q: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct UpcomingQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PublicationRequest {
    pub kind: PublicationKind,
    pub title: String,
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub cover_media_id: Option<i64>,
    #[serde(default)]
    pub event_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub event_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub event_location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: PublicationStatus,
}

#[derive(Debug, Serialize)]
pub struct UpcomingEvent {
    #[serde(flatten)]
    pub publication: Publication,
    pub calendar_url: String,
    pub google_calendar_url: Option<String>,
}

impl PublicationRequest {
    /// Validates the request and derives the stored search text and excerpt.
    fn into_record(self) -> AppResult<PublicationRecord> {
        let title = required(&self.title, "title")?;
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(AppError::validation(format!(
                "title must be at most {MAX_TITLE_CHARS} characters"
            )));
        }

        let (event_start, event_end, event_location) = if self.kind == PublicationKind::Event {
            let start = self
                .event_start
                .ok_or_else(|| AppError::validation("events require event_start"))?;
            if self.event_end.is_some_and(|end| end < start) {
                return Err(AppError::validation("event_end must not precede event_start"));
            }
            (Some(start), self.event_end, optional_text(self.event_location))
        } else {
            (None, None, None)
        };

        let body_text = content_text::extract_plain_text(&self.content);
        Ok(PublicationRecord {
            kind: self.kind,
            excerpt: content_text::excerpt(&body_text, EXCERPT_CHARS),
            body_text,
            title,
            content: self.content,
            pinned: self.pinned,
            cover_media_id: self.cover_media_id,
            event_start,
            event_end,
            event_location,
        })
    }
}

fn ensure_cover_exists(conn: &rusqlite::Connection, cover: Option<i64>) -> AppResult<()> {
    if let Some(id) = cover {
        match media::find(conn, id) {
            Ok(_) => {}
            Err(DbError::NotFound(_)) => {
                return Err(AppError::validation(format!("cover media {id} does not exist")))
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

async fn published_page(
    state: &AppState,
    kind: Option<PublicationKind>,
    q: Option<String>,
    page: Option<u32>,
    per_page: Option<u32>,
) -> AppResult<Json<Page<Publication>>> {
    let page = page_request(page, per_page);
    let (items, total) = with_db(state, move |conn| {
        let filter = PublicationFilter {
            kind,
            status: Some(PublicationStatus::Published),
            q: q.as_deref(),
        };
        Ok(publications::list(conn, &filter, page)?)
    })
    .await?;
    Ok(Json(Page::new(items, total, page)))
}

pub async fn list_published(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Page<Publication>>> {
    published_page(&state, query.kind, query.q, query.page, query.per_page).await
}

pub async fn list_news(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Page<Publication>>> {
    published_page(
        &state,
        Some(PublicationKind::News),
        query.q,
        query.page,
        query.per_page,
    )
    .await
}

pub async fn get_published(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<Publication>> {
    let publication =
        with_db(&state, move |conn| Ok(publications::find_published(conn, &slug)?)).await?;
    Ok(Json(publication))
}

pub async fn upcoming_events(
    State(state): State<AppState>,
    Query(query): Query<UpcomingQuery>,
) -> AppResult<Json<Vec<UpcomingEvent>>> {
    let limit = query.limit.unwrap_or(DEFAULT_UPCOMING).clamp(1, MAX_UPCOMING);
    let events =
        with_db(&state, move |conn| Ok(publications::upcoming_events(conn, Utc::now(), limit)?))
            .await?;

    let host = state.config.public_host();
    let base_url = state.config.public_base_url.trim_end_matches('/');
    let views = events
        .into_iter()
        .map(|publication| {
            let google_calendar_url = CalendarEvent::from_publication(&publication, &host, base_url)
                .map(|event| calendar::google_calendar_link(&event));
            UpcomingEvent {
                calendar_url: format!("/api/events/{}/calendar.ics", publication.slug),
                google_calendar_url,
                publication,
            }
        })
        .collect();
    Ok(Json(views))
}

pub async fn event_calendar(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<impl IntoResponse> {
    let publication =
        with_db(&state, move |conn| Ok(publications::find_published(conn, &slug)?)).await?;
    let event = CalendarEvent::from_publication(
        &publication,
        &state.config.public_host(),
        &state.config.public_base_url,
    )
    .ok_or_else(|| AppError::not_found("event"))?;

    let body = calendar::event_to_ics(&event, Utc::now());
    let disposition = format!(
        "attachment; filename=\"{}\"",
        calendar::ics_file_name(&publication.slug)
    );
    Ok((
        [
            (CONTENT_TYPE, "text/calendar; charset=utf-8".to_string()),
            (CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

pub async fn list_all(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Page<Publication>>> {
    require_feature(&user, AdminFeature::Publications)?;
    let page = page_request(query.page, query.per_page);
    let (items, total) = with_db(&state, move |conn| {
        let filter = PublicationFilter {
            kind: query.kind,
            status: query.status,
            q: query.q.as_deref(),
        };
        Ok(publications::list(conn, &filter, page)?)
    })
    .await?;
    Ok(Json(Page::new(items, total, page)))
}

pub async fn get_publication(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Publication>> {
    require_feature(&user, AdminFeature::Publications)?;
    let publication = with_db(&state, move |conn| Ok(publications::find(conn, id)?)).await?;
    Ok(Json(publication))
}

pub async fn create_publication(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<PublicationRequest>,
) -> AppResult<(StatusCode, Json<Publication>)> {
    require_feature(&user, AdminFeature::Publications)?;
    let author = user.id();
    let record = request.into_record()?;

    let publication = with_tx(&state, move |conn| {
        ensure_cover_exists(conn, record.cover_media_id)?;
        let slug = slug::unique_slug(&slug::slugify(&record.title), |candidate| {
            publications::slug_taken(conn, candidate)
        })?;
        let publication = publications::insert(conn, &record, &slug, Some(author), Utc::now())?;
        audit::record(
            conn,
            author,
            "publication.create",
            "publication",
            Some(publication.id),
            json!({ "kind": publication.kind, "slug": publication.slug }),
        )?;
        Ok(publication)
    })
    .await?;

    info!(publication_id = publication.id, slug = %publication.slug, "publication created");
    Ok((StatusCode::CREATED, Json(publication)))
}

pub async fn update_publication(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(request): Json<PublicationRequest>,
) -> AppResult<Json<Publication>> {
    require_feature(&user, AdminFeature::Publications)?;
    let actor = user.id();
    let record = request.into_record()?;

    let publication = with_tx(&state, move |conn| {
        ensure_cover_exists(conn, record.cover_media_id)?;
        let publication = publications::update(conn, id, &record, Utc::now())?;
        audit::record(
            conn,
            actor,
            "publication.update",
            "publication",
            Some(id),
            json!({ "title": publication.title }),
        )?;
        Ok(publication)
    })
    .await?;
    Ok(Json(publication))
}

pub async fn change_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(request): Json<StatusRequest>,
) -> AppResult<Json<Publication>> {
    require_feature(&user, AdminFeature::Publications)?;
    let actor = user.id();
    let next = request.status;

    let (publication, previous) = with_tx(&state, move |conn| {
        let current = publications::find(conn, id)?;
        if !current.status.can_transition_to(next) {
            return Err(AppError::validation(format!(
                "cannot move a {} publication to {next}",
                current.status
            )));
        }
        let publication = publications::set_status(conn, id, next, Utc::now())?;
        audit::record(
            conn,
            actor,
            "publication.status",
            "publication",
            Some(id),
            json!({ "from": current.status, "to": next }),
        )?;
        Ok((publication, current.status))
    })
    .await?;

    info!(publication_id = id, from = %previous, to = %next, "publication status changed");
    if next == PublicationStatus::Published {
        state.notifications.dispatch(notifications::publication_published(
            &publication,
            &state.config.public_base_url,
        ));
    }
    Ok(Json(publication))
}

pub async fn delete_publication(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    require_feature(&user, AdminFeature::Publications)?;
    let actor = user.id();
    with_tx(&state, move |conn| {
        let publication = publications::find(conn, id)?;
        publications::delete(conn, id)?;
        audit::record(
            conn,
            actor,
            "publication.delete",
            "publication",
            Some(id),
            json!({ "slug": publication.slug }),
        )?;
        Ok(())
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
