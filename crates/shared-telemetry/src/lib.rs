//! # Shared Telemetry
//!
//! Structured logging and Prometheus metrics shared by every crate in
//! the OMR evaluation pipeline workspace.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shared_telemetry::{TelemetryConfig, init_telemetry};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = TelemetryConfig::from_env();
//!     let _guard = init_telemetry(config).expect("failed to init telemetry");
//!
//!     // Application code here. Structured logs and metrics are now active.
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OMR_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `OMR_JSON_LOGS` | `false` (`true` in containers) | JSON-formatted logs |
//! | `OMR_METRICS_PORT` | `9100` | Prometheus metrics port |

mod config;
mod logging;
mod metrics;

pub use config::TelemetryConfig;
pub use logging::StructuredLogger;
pub use metrics::{encode_metrics, register_metrics, HistogramTimer, MetricsHandle, REGISTRY};

use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Telemetry initialization errors.
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("invalid telemetry configuration: {0}")]
    Config(String),
}

/// Initialize structured logging and metrics registration for the process.
///
/// Returns a guard that should be held for the lifetime of the
/// application; dropping it is a no-op today but keeps the call site
/// stable if a flushing backend is added later.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| TelemetryError::TracingInit(e.to_string()))?;

    if config.json_logs {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer.with_filter(tracing_subscriber::filter::LevelFilter::TRACE))
            .try_init()
            .map_err(|e| TelemetryError::TracingInit(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(config.console_output);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::TracingInit(e.to_string()))?;
    }

    let metrics_handle = register_metrics()?;

    tracing::info!(
        service = %config.full_service_name(),
        "telemetry initialized"
    );

    Ok(TelemetryGuard {
        _metrics: metrics_handle,
    })
}

/// Guard that keeps telemetry active. Drop at process shutdown.
pub struct TelemetryGuard {
    _metrics: MetricsHandle,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "omr-coordinator");
    }
}
