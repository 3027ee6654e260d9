use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::database::queries::settings;
use crate::database::{Database, DbError};
use crate::middleware::{RateLimiter, SettingsCache};
use crate::services::notifications::Notifications;

/// Shared handles passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Database,
    pub notifications: Notifications,
    pub rate_limiter: Arc<RateLimiter>,
    pub settings: Arc<SettingsCache>,
}

impl AppState {
    pub async fn new(config: Config, db: Database, notifications: Notifications) -> Result<Self, DbError> {
        let current = db.call(|conn| settings::load(conn)).await?;
        info!(maintenance = current.maintenance_mode, "loaded site settings");

        Ok(Self {
            rate_limiter: Arc::new(RateLimiter::new(&config.rate_limit)),
            settings: Arc::new(SettingsCache::new(current)),
            config: Arc::new(config),
            db,
            notifications,
        })
    }

    /// In-memory database, no outbound channels.
    pub async fn for_tests() -> Result<Self, DbError> {
        Self::new(
            Config::for_tests(),
            Database::open_in_memory()?,
            Notifications::default(),
        )
        .await
    }
}
