//! HTTP server initialization and runtime setup.
//!
//! Handles database connections, event channel setup, worker spawning, the
//! Axum server lifecycle and the shutdown sequence.

use crate::application::services::ClickRecorder;
use crate::config::Config;
use crate::domain::click_worker::run_click_worker;
use crate::domain::repositories::LinkRepository;
use crate::infrastructure::messaging::{
    EventChannel, InMemoryEventChannel, RedisStreamChannel, TelemetryPublisher,
};
use crate::infrastructure::persistence::PgLinkRepository;
use crate::routes::app_router;
use crate::state::AppState;

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Extra time granted to the publisher on shutdown beyond its request timeout.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Opens the PostgreSQL pool with the configured limits.
///
/// # Errors
///
/// Returns an error if the database cannot be reached.
pub async fn connect_database(config: &Config) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
        .idle_timeout(Duration::from_secs(config.db_idle_timeout))
        .max_lifetime(Duration::from_secs(config.db_max_lifetime))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Connected to database");
    Ok(pool)
}

/// Connects the configured event channel.
///
/// Falls back to the in-process channel when Redis is not configured or
/// cannot be reached; click events are then lost on restart.
pub async fn connect_event_channel(config: &Config) -> Arc<dyn EventChannel> {
    if let Some(redis_url) = &config.redis_url {
        match RedisStreamChannel::connect(redis_url, config.producer.replica_acks()).await {
            Ok(channel) => {
                tracing::info!("Event channel: Redis Streams");
                return Arc::new(channel);
            }
            Err(e) => {
                tracing::warn!("{}. Using in-process event channel.", e);
            }
        }
    } else {
        tracing::warn!("REDIS_URL not set, using in-process event channel");
    }

    Arc::new(InMemoryEventChannel::new())
}

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - PostgreSQL connection pool
/// - Apply migrations
/// - Event channel and telemetry publisher
/// - Background click worker
/// - Axum HTTP server
///
/// On SIGINT/SIGTERM the server stops accepting connections and finishes
/// in-flight requests, then the click queue closes, the worker drains and
/// the publisher is closed.
///
/// # Errors
///
/// Returns an error if:
/// - Database connection or migration fails
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    let pool = connect_database(&config).await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let channel = connect_event_channel(&config).await;
    let publisher = Arc::new(TelemetryPublisher::new(channel, &config.producer));

    let link_repository: Arc<dyn LinkRepository> =
        Arc::new(PgLinkRepository::new(Arc::new(pool.clone())));

    let (click_recorder, click_rx) = ClickRecorder::new(config.click_queue_capacity);
    let worker = tokio::spawn(run_click_worker(
        click_rx,
        Arc::clone(&publisher),
        Arc::clone(&link_repository),
        config.click_worker_concurrency,
    ));
    tracing::info!("Click worker started");

    let state = AppState::new(
        link_repository,
        click_recorder,
        Arc::clone(&publisher),
        &config.base_url,
        config.max_custom_code_length,
    );

    let app = app_router(state);

    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("HTTP server stopped, draining click events");

    // The router and its state are gone, so the click queue is closed.
    let drain_budget = config.producer.request_timeout + CLOSE_GRACE;
    match tokio::time::timeout(drain_budget, worker).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("Click worker failed: {}", e),
        Err(_) => tracing::warn!("Click worker did not drain within {:?}", drain_budget),
    }

    if let Err(e) = publisher.close(CLOSE_GRACE).await {
        tracing::warn!("Failed to close event channel: {}", e);
    }

    pool.close().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
