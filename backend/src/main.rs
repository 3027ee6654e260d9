//! Main entry point for the Courtyard backend.
//!
//! This file initializes logging, loads the configuration, opens the database, wires
//! the notification channels and serves the router until a shutdown signal arrives.

use std::error::Error;
use std::net::SocketAddr;
use std::time::Duration;

use chrono::Utc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use courtyard_backend::build_router;
use courtyard_backend::config::Config;
use courtyard_backend::database::queries::users::purge_expired_sessions;
use courtyard_backend::database::Database;
use courtyard_backend::services::notifications::Notifications;
use courtyard_backend::state::AppState;

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Loading configuration...");
    let config = Config::load()?;

    let db = match &config.database_path {
        Some(path) => Database::open(path)?,
        None => Database::open_in_memory()?,
    };
    let notifications = Notifications::from_config(&config);
    let address = config.listen_address();
    let sweep_interval = config.rate_limit.sweep_interval;

    let state = AppState::new(config, db, notifications).await?;
    state.rate_limiter.spawn_sweeper(sweep_interval);
    spawn_session_purge(state.db.clone());

    let app = build_router(state);

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

fn spawn_session_purge(db: Database) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            match db.call(|conn| purge_expired_sessions(conn, Utc::now())).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "purged expired sessions"),
                Err(err) => error!(error = %err, "session purge failed"),
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
