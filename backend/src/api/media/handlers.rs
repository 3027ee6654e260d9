//! Handler functions for media management.

use axum::extract::multipart::{Multipart, MultipartError};
use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::api::extract::{Json, Path, Query};
use crate::api::{page_request, with_db, with_tx};
use crate::auth::{require_feature, AdminFeature, CurrentUser};
use crate::database::models::{MediaItem, Page};
use crate::database::queries::media::{self as media_rows, NewMedia};
use crate::errors::{AppError, AppResult};
use crate::services::{audit, media};
use crate::state::AppState;

const FILE_FIELD: &str = "file";

#[derive(Debug, Deserialize)]
pub struct MediaQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge
    } else {
        AppError::validation(err.body_text())
    }
}

struct Upload {
    original_name: String,
    mime: String,
    bytes: Vec<u8>,
}

async fn read_file_field(multipart: &mut Multipart) -> AppResult<Upload> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let original_name = media::clean_original_name(field.file_name().unwrap_or_default());
        let mime = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        return Ok(Upload {
            original_name,
            mime,
            bytes: bytes.to_vec(),
        });
    }
    Err(AppError::validation(format!("multipart field `{FILE_FIELD}` is missing")))
}

pub async fn upload_media(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<MediaItem>)> {
    require_feature(&user, AdminFeature::Media)?;
    let actor = user.id();

    let upload = read_file_field(&mut multipart).await?;
    let ext = media::validate_upload(&upload.mime, upload.bytes.len(), state.config.media_max_bytes)?;
    let media_dir = state.config.media_dir.clone();
    let file_name = media::store(&media_dir, &upload.bytes, ext).await?;

    let stored_name = file_name.clone();
    let size_bytes = i64::try_from(upload.bytes.len()).map_err(AppError::internal)?;
    let inserted = with_tx(&state, move |conn| {
        let item = media_rows::insert(
            conn,
            &NewMedia {
                file_name: &stored_name,
                original_name: &upload.original_name,
                mime: &upload.mime,
                size_bytes,
                uploaded_by: Some(actor),
            },
            Utc::now(),
        )?;
        audit::record(
            conn,
            actor,
            "media.upload",
            "media",
            Some(item.id),
            json!({ "file_name": item.file_name, "original_name": item.original_name }),
        )?;
        Ok(item)
    })
    .await;

    match inserted {
        Ok(item) => {
            info!(media_id = item.id, file = %item.file_name, size = item.size_bytes, "media uploaded");
            Ok((StatusCode::CREATED, Json(item)))
        }
        Err(err) => {
            if let Err(cleanup) = media::remove(&media_dir, &file_name).await {
                warn!(file = %file_name, error = %cleanup, "orphaned upload left on disk");
            }
            Err(err)
        }
    }
}

pub async fn list_media(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<MediaQuery>,
) -> AppResult<Json<Page<MediaItem>>> {
    require_feature(&user, AdminFeature::Media)?;
    let page = page_request(query.page, query.per_page);
    let (items, total) = with_db(&state, move |conn| Ok(media_rows::list(conn, page)?)).await?;
    Ok(Json(Page::new(items, total, page)))
}

pub async fn delete_media(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    require_feature(&user, AdminFeature::Media)?;
    let actor = user.id();
    let item = with_tx(&state, move |conn| {
        let item = media_rows::delete(conn, id)?;
        audit::record(
            conn,
            actor,
            "media.delete",
            "media",
            Some(id),
            json!({ "file_name": item.file_name }),
        )?;
        Ok(item)
    })
    .await?;

    media::remove(&state.config.media_dir, &item.file_name).await?;
    Ok(StatusCode::NO_CONTENT)
}
