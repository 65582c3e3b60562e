//! Fleetops HTTP server.
//!
//! Wires the `PostgreSQL` store, the event hub and the runtime services behind
//! the axum router, exposes Prometheus metrics, and shuts down gracefully on
//! Ctrl+C or SIGTERM.

mod config;

use anyhow::Context;
use config::Config;
use fleetops_core::environment::SystemClock;
use fleetops_postgres::PostgresFleetStore;
use fleetops_runtime::metrics::MetricsServer;
use fleetops_runtime::EventHub;
use fleetops_web::{build_router, AppState};
use std::future::IntoFuture;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleetops=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        addr = %config.server.addr(),
        metrics_addr = %config.server.metrics_addr,
        observer_capacity = config.hub.observer_capacity,
        "Starting fleetops server"
    );

    let mut metrics = MetricsServer::new(config.server.metrics_addr);
    metrics.start().context("failed to start metrics exporter")?;

    info!("Connecting to database...");
    let store = PostgresFleetStore::connect(
        &config.database.url,
        config.database.max_connections,
        config.database.connect_timeout,
    )
    .await
    .context("failed to connect to database")?;
    store.migrate().await.context("failed to run migrations")?;
    info!("Database ready");

    let state = AppState::new(
        Arc::new(store),
        EventHub::new(config.hub),
        Arc::new(SystemClock),
        config.tracking,
    );
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.server.addr())
        .await
        .with_context(|| format!("failed to bind {}", config.server.addr()))?;
    info!(addr = %config.server.addr(), "HTTP server listening");

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let mut drain_rx = shutdown_tx.subscribe();

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.wait_for(|stop| *stop).await;
        })
        .into_future();

    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    // Websocket observers never finish on their own; cap the drain.
    let shutdown_timeout = config.server.shutdown_timeout;
    let drain_deadline = async move {
        let _ = drain_rx.wait_for(|stop| *stop).await;
        tokio::time::sleep(shutdown_timeout).await;
    };

    tokio::select! {
        result = server => result.context("HTTP server error")?,
        () = drain_deadline => {
            warn!(
                timeout_secs = shutdown_timeout.as_secs(),
                "Shutdown timeout elapsed, closing remaining connections"
            );
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        () = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
