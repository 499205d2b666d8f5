//! Upstream Shield service
//!
//! Runs the shared cache and the per-upstream circuit breakers with their
//! background tasks, and exposes them over the admin HTTP API. Callers reach
//! the upstreams through `AppState::shield`, which shares this cache and
//! these breakers.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use upstream_shield::api::{create_router, AppState};
use upstream_shield::{spawn_cleanup_task, spawn_stats_reporter, Config};

/// Main entry point for the Upstream Shield service.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create cache store and circuit breakers
/// 4. Start background TTL cleanup and stats reporter tasks
/// 5. Create Axum router with all admin endpoints
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "upstream_shield=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Upstream Shield");

    let config = Config::from_env();
    info!(
        max_entries = config.max_entries,
        port = config.server_port,
        cleanup_interval = config.cleanup_interval,
        stats_interval = config.stats_interval,
        retry_max_attempts = config.retry.max_attempts,
        breaker_failure_threshold = config.breaker.failure_threshold,
        "Configuration loaded"
    );

    let state = AppState::from_config(&config);
    info!(breakers = state.breakers.len(), "Cache store and breakers initialized");

    let mut tasks = vec![spawn_cleanup_task(
        state.cache.clone(),
        Duration::from_secs(config.cleanup_interval.max(1)),
    )];
    if config.stats_interval > 0 {
        tasks.push(spawn_stats_reporter(
            state.cache.clone(),
            state.breakers.iter().cloned().collect(),
            Duration::from_secs(config.stats_interval),
        ));
    }
    info!(count = tasks.len(), "Background tasks started");

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Admin API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(tasks))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the background tasks and allows graceful shutdown.
async fn shutdown_signal(tasks: Vec<JoinHandle<()>>) {
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
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    for task in &tasks {
        task.abort();
    }
    warn!(count = tasks.len(), "Background tasks aborted");
}
