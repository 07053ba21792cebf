//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own, without the background lifecycle monitor.
//!
//! ## Intended use
//! Useful for development and debugging when only the REST surface (with OpenAPI/Swagger UI)
//! is needed. Scans can still be triggered through `POST /lifecycle/scan`. The workspace's
//! main `ledger-run` binary runs the server and the monitor together.

use api_rest::AppState;
use ledger_core::{CoreConfig, LedgerServices};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the ledger REST API server
///
/// # Environment Variables
/// - `LEDGER_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `LEDGER_DATA_DIR`: Directory holding the snapshot files (default: "ledger_data")
/// - `COMPLIANCE_RECENCY_DAYS`: Recency window for goal assessments (default: 30)
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - configuration values are invalid or a snapshot cannot be opened,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("ledger_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("LEDGER_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    tracing::info!("-- Starting ledger REST API on {}", addr);

    let cfg = Arc::new(CoreConfig::from_env_values(
        std::env::var("LEDGER_DATA_DIR").ok(),
        std::env::var("LIFECYCLE_SCAN_INTERVAL_SECS").ok(),
        std::env::var("COMPLIANCE_RECENCY_DAYS").ok(),
    )?);
    let services = LedgerServices::open(cfg)?;

    let app = api_rest::router(AppState::new(services));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
