//! Process wiring: storage, source client, scheduler and HTTP server.

use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use ticket_sync_core::{GatewayError, SourceError};
use ticket_sync_postgres::PostgresGateway;
use ticket_sync_pretix::PretixClient;
use ticket_sync_runtime::{
    MetricsError, MetricsExporter, SyncEnvironment, SyncScheduler, TracingErrorReporter,
};
use tokio::net::TcpListener;

use crate::config::{Config, ConfigError};
use crate::server::{AppState, build_router};

/// Errors that stop the daemon from starting or serving.
#[derive(Error, Debug)]
pub enum DaemonError {
    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Database connection or migration failure
    #[error("Storage setup failed: {0}")]
    Storage(#[from] GatewayError),

    /// HTTP client construction failure
    #[error("Source client setup failed: {0}")]
    Source(#[from] SourceError),

    /// Metrics recorder installation failure
    #[error(transparent)]
    Metrics(#[from] MetricsError),

    /// Listener or server failure
    #[error("HTTP server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the daemon until `shutdown` resolves.
///
/// Applies migrations, starts the scheduler, serves HTTP, then waits for the
/// in-flight cycle (bounded by the configured shutdown timeout) before
/// returning.
///
/// # Errors
///
/// Returns [`DaemonError`] if any component fails to start or the server
/// fails while running.
pub async fn run<F>(config: Config, shutdown: F) -> Result<(), DaemonError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let organizers = config.load_organizers()?;
    let metrics = MetricsExporter::install()?;

    let gateway = PostgresGateway::connect(&config.database.url, config.database.max_connections).await?;
    gateway.run_migrations().await?;

    let client = PretixClient::with_config(&config.pretix_config())?;

    let pairs: usize = organizers.iter().map(|o| o.events.len()).sum();
    tracing::info!(organizers = organizers.len(), pairs, "Loaded organizer configuration");

    let scheduler = SyncScheduler::new(
        organizers,
        Arc::new(client),
        SyncEnvironment::new(Arc::new(gateway), Arc::new(TracingErrorReporter)),
        config.scheduler_config(),
    );
    scheduler.start();

    let state = AppState {
        scheduler: scheduler.clone(),
        metrics: Some(metrics),
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "HTTP server listening");

    let served = axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await;

    tracing::info!("Stopping sync scheduler");
    if tokio::time::timeout(config.server.shutdown_timeout, scheduler.stop_and_wait())
        .await
        .is_err()
    {
        tracing::warn!(
            timeout_secs = config.server.shutdown_timeout.as_secs(),
            "In-flight sync cycle did not finish before the shutdown timeout"
        );
    }

    served?;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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

    tracing::info!("Shutdown signal received");
}
