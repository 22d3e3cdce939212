//! Coordinator process entry point.

use anyhow::Context;
use tracing::info;

use omr_runtime::{AppConfig, AppContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _telemetry = shared_telemetry::init_telemetry(shared_telemetry::TelemetryConfig::for_component("runtime"))
        .context("failed to initialize telemetry")?;

    info!("OMR evaluation pipeline coordinator starting");

    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load(path).context("failed to load config file")?,
        None => AppConfig::from_env().context("failed to load config from environment")?,
    };

    let listen_addr = config.api.listen_addr;
    let context = AppContext::build(config).await.context("failed to assemble application context")?;
    let router = context.router();

    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind {listen_addr}"))?;
    info!(%listen_addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("received shutdown signal");
}
