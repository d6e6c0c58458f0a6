//! # rpk-api: Binary Entry Point
//!
//! Reads configuration from the environment, wires the registry, starts the
//! nightly regression sweep and the statute scan, and serves the API.

use std::sync::Arc;

use rpk_api::state::{AppConfig, AppState, LogFormat};
use rpk_registry::{NoopStatuteMonitor, RegistryJobs};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(?config, "configuration loaded");

    let port = config.port;
    let sweep_hour = config.sweep_hour_utc;
    let scan_interval = config.statute_scan_interval;
    let state = AppState::from_config(config).map_err(|e| {
        tracing::error!("state initialization failed: {e}");
        e
    })?;

    // Findings arrive by push on /v1/statute/findings; the scheduled scan
    // polls a monitor that reports nothing until one is wired.
    let jobs = RegistryJobs::new(
        state.registry.clone(),
        Arc::new(NoopStatuteMonitor),
        sweep_hour,
        scan_interval,
    );
    let _job_handles = jobs.spawn();

    let app = rpk_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("rulepack registry API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
