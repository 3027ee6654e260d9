//! Read access to the audit log for staff with the `audit_log` feature.

use axum::extract::State;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use crate::api::extract::{Json, Query};
use crate::api::{page_request, with_db};
use crate::auth::{require_feature, AdminFeature, CurrentUser};
use crate::database::models::{AuditEntry, Page};
use crate::database::queries::audit;
use crate::errors::AppResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub entity: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

pub fn audit_router() -> Router<AppState> {
    Router::new().route("/admin/audit", get(list_audit))
}

pub async fn list_audit(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<AuditQuery>,
) -> AppResult<Json<Page<AuditEntry>>> {
    require_feature(&user, AdminFeature::AuditLog)?;
    let page = page_request(query.page, query.per_page);
    let entity = query
        .entity
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty());
    let (items, total) =
        with_db(&state, move |conn| Ok(audit::list(conn, entity.as_deref(), page)?)).await?;
    Ok(Json(Page::new(items, total, page)))
}
