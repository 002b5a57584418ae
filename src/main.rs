//! listing-notify server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use listing_notify::api;
use listing_notify::app_state::AppState;
use listing_notify::config::{HubConfig, LogFormat};
use listing_notify::persistence::{
    InMemoryStore, NotificationStore, PostgresStore, RecipientDirectory, SessionResolver,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = HubConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    tracing::info!(addr = %config.listen_addr, "starting listing-notify");

    let (store, directory, sessions) = build_stores(&config).await?;
    let settings = config.connection_settings();
    let app_state = AppState::new(store, directory, sessions, settings, config.handler_timeout());
    let registry = Arc::clone(app_state.hub.registry());

    let app = api::build_app(app_state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(
        addr = %config.listen_addr,
        pong_wait = ?settings.pong_wait,
        overflow = %settings.overflow_policy,
        "server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let closed = registry.close_all().await;
            tracing::info!(closed, "shutdown requested, closed live connections");
        })
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

type Stores = (
    Arc<dyn NotificationStore>,
    Arc<dyn RecipientDirectory>,
    Arc<dyn SessionResolver>,
);

/// Connects to PostgreSQL, or falls back to the in-memory store when
/// persistence is disabled.
async fn build_stores(config: &HubConfig) -> anyhow::Result<Stores> {
    if !config.persistence_enabled {
        tracing::warn!("persistence disabled, using in-memory store");
        let store = Arc::new(InMemoryStore::new());
        return Ok((
            Arc::clone(&store) as Arc<dyn NotificationStore>,
            Arc::clone(&store) as Arc<dyn RecipientDirectory>,
            store as Arc<dyn SessionResolver>,
        ));
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .min_connections(config.database_min_connections)
        .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
        .connect(&config.database_url)
        .await
        .context("failed to connect to PostgreSQL")?;

    let store = Arc::new(PostgresStore::new(pool));
    if config.run_migrations {
        store.migrate().await.context("failed to run migrations")?;
        tracing::info!("migrations applied");
    }

    Ok((
        Arc::clone(&store) as Arc<dyn NotificationStore>,
        Arc::clone(&store) as Arc<dyn RecipientDirectory>,
        store as Arc<dyn SessionResolver>,
    ))
}

/// Resolves on SIGINT or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
