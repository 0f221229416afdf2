//! Orchestrator entry point.

use anyhow::{Context, Result};
use orchestrator_core::dispatcher::Dispatcher;
use orchestrator_core::launcher::{CloudRunLauncher, DryRunLauncher, Launcher};
use orchestrator_core::notifier::Notifier;
use orchestrator_core::recovery::Recovery;
use orchestrator_core::server::{build_app, AppState};
use orchestrator_core::store::{PostgresStore, Store};
use orchestrator_core::Config;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,orchestrator_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting build job orchestrator");

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    let store: Arc<dyn Store> = Arc::new(PostgresStore::new(pool));

    let launcher: Arc<dyn Launcher> = if config.dry_run {
        tracing::warn!("DRY_RUN enabled: worker launches are simulated");
        Arc::new(DryRunLauncher)
    } else {
        Arc::new(CloudRunLauncher::new(&config)?)
    };

    let notifier = Arc::new(Notifier::new(
        store.clone(),
        config.notifier_url.clone(),
        config.notifier_bearer.clone(),
    ));

    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        launcher,
        config.max_concurrent_jobs,
        Duration::from_millis(config.poll_interval_ms),
    ));
    let dispatcher_handle = dispatcher.spawn();

    let recovery = Arc::new(Recovery::new(
        store.clone(),
        config.stale_threshold_minutes,
        Duration::from_secs(config.recovery_interval_secs),
    ));
    let recovery_handle = recovery.spawn();

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .context("Failed to build HTTP client")?;

    let state = AppState { store, notifier, http_client };
    let app = build_app(state, config.webhook_secret.clone());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    dispatcher_handle.abort();
    recovery_handle.abort();

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections...");
}
