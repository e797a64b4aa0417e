use std::net::{IpAddr, SocketAddr};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tradecard_worker::background;
use tradecard_worker::config::WorkerConfig;
use tradecard_worker::error::StartupError;
use tradecard_worker::router::build_app_router;
use tradecard_worker::state::AppState;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "tradecard_worker=info,tradecard_pipeline=info,tradecard_core=info,tower_http=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Worker failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), StartupError> {
    // --- Configuration ---
    let config = WorkerConfig::from_env()?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        ram_limit_mb = config.ram_limit_mb,
        max_jobs = config.max_jobs,
        queue_concurrency = config.queue_concurrency,
        "Loaded worker configuration"
    );

    let ip: IpAddr = config.host.parse().map_err(|e: std::net::AddrParseError| {
        StartupError::Address {
            addr: config.host.clone(),
            reason: e.to_string(),
        }
    })?;
    let addr = SocketAddr::new(ip, config.port);
    let watchdog_period = config.memory_check_interval();

    // --- App state ---
    let state = AppState::from_config(config)?;

    // --- Memory watchdog ---
    let watchdog_cancel = CancellationToken::new();
    let watchdog_handle = tokio::spawn(background::memory_watchdog::run(
        Arc::clone(&state.monitor),
        watchdog_period,
        watchdog_cancel.clone(),
    ));

    // --- Router ---
    let queue = Arc::clone(&state.queue);
    let app = build_app_router(state)?;

    // --- Start server ---
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Render worker listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    queue.close();
    watchdog_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), watchdog_handle).await;
    tracing::info!("Memory watchdog stopped");

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix). If a handler cannot
/// be installed, that signal is simply never observed.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
