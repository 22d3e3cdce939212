//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for structured logging and metrics.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to every log line.
    pub service_name: String,

    /// Component identifier (ledger, store, orchestrator, api, ...).
    pub component: String,

    /// Log level filter (trace, debug, info, warn, error).
    pub log_level: String,

    /// Whether to enable console output (for development).
    pub console_output: bool,

    /// Whether to enable JSON formatted logs.
    pub json_logs: bool,

    /// Prometheus metrics port.
    pub metrics_port: u16,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "omr-coordinator".to_string(),
            component: "main".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
            metrics_port: 9100,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OMR_SERVICE_NAME`: Service name (default: omr-coordinator)
    /// - `OMR_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `OMR_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `OMR_JSON_LOGS`: Enable JSON logs (default: false in dev, true in containers)
    /// - `OMR_METRICS_PORT`: Prometheus metrics port (default: 9100)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("OMR_SERVICE_NAME")
                .unwrap_or_else(|_| "omr-coordinator".to_string()),

            component: env::var("OMR_COMPONENT").unwrap_or_else(|_| "main".to_string()),

            log_level: env::var("OMR_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            console_output: env::var("OMR_CONSOLE_OUTPUT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),

            json_logs: env::var("OMR_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),

            metrics_port: env::var("OMR_METRICS_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(9100),
        }
    }

    /// Configuration for a specific component, inheriting the rest from env.
    pub fn for_component(component: &str) -> Self {
        let mut config = Self::from_env();
        config.component = component.to_string();
        config
    }

    /// Full service name including the component suffix.
    pub fn full_service_name(&self) -> String {
        if self.component == "main" {
            self.service_name.clone()
        } else {
            format!("{}-{}", self.service_name, self.component)
        }
    }
}
