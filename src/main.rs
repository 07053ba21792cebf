use ledger_core::{CoreConfig, LedgerServices};
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;

/// Main entry point for the attendance ledger service
///
/// Runs the REST server and the lifecycle monitor concurrently until Ctrl-C:
/// - REST server on port 3000 (configurable via LEDGER_REST_ADDR)
/// - Lifecycle monitor scanning every LIFECYCLE_SCAN_INTERVAL_SECS
///
/// # Environment Variables
/// - `LEDGER_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `LEDGER_DATA_DIR`: Directory holding the snapshot files (default: "ledger_data")
/// - `LIFECYCLE_SCAN_INTERVAL_SECS`: Seconds between lifecycle scans (default: 3600)
/// - `COMPLIANCE_RECENCY_DAYS`: Recency window for goal assessments (default: 30)
///
/// # Errors
/// Returns an error if configuration is invalid, a snapshot cannot be opened, the address
/// cannot be bound, or the server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ledger_run=info".parse()?)
                .add_directive("ledger_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("LEDGER_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let cfg = Arc::new(CoreConfig::from_env_values(
        std::env::var("LEDGER_DATA_DIR").ok(),
        std::env::var("LIFECYCLE_SCAN_INTERVAL_SECS").ok(),
        std::env::var("COMPLIANCE_RECENCY_DAYS").ok(),
    )?);

    tracing::info!("++ Starting ledger REST on {}", rest_addr);
    tracing::info!(
        "++ Starting lifecycle monitor every {}s",
        cfg.scan_interval().as_secs()
    );

    let services = LedgerServices::open(cfg)?;
    let (stop_tx, stop_rx) = watch::channel(false);

    let monitor = services.monitor.clone();
    let monitor_task = tokio::spawn(monitor.run(stopped(stop_rx.clone())));

    let app = api_rest::router(AppState::new(services));
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    let rest_server = axum::serve(listener, app).with_graceful_shutdown(stopped(stop_rx));

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("-- Shutdown requested"),
            Err(e) => {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                // Dropping the sender would stop both services.
                std::future::pending::<()>().await;
            }
        }
        let _ = stop_tx.send(true);
    });

    rest_server.await?;
    monitor_task.await?;

    Ok(())
}

async fn stopped(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}
