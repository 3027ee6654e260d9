use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::error;

use crate::services::antibot;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub database: bool,
}

#[derive(Debug, Serialize)]
pub struct AntiBotToken {
    pub token: String,
    pub issued_at: DateTime<Utc>,
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Health>) {
    let database = state
        .db
        .call(|conn| Ok(conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?))
        .await;

    match database {
        Ok(_) => (
            StatusCode::OK,
            Json(Health {
                status: "ok",
                database: true,
            }),
        ),
        Err(err) => {
            error!(error = %err, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(Health {
                    status: "degraded",
                    database: false,
                }),
            )
        }
    }
}

/// Issues the time token a form embeds when it is rendered.
pub async fn antibot_token() -> Json<AntiBotToken> {
    let issued_at = Utc::now();
    Json(AntiBotToken {
        token: antibot::encode_time_token(issued_at.timestamp_millis()),
        issued_at,
    })
}
