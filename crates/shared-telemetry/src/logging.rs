//! Structured logging helpers.
//!
//! Logs are formatted as JSON in container environments and as
//! human-readable text otherwise (see `TelemetryConfig::json_logs`),
//! with consistent fields so they can be shipped to any log
//! aggregator without a bespoke parser:
//! - `timestamp`: set by the subscriber
//! - `level`: log level
//! - `component`: which crate/component emitted the line
//! - `message`: log message
//! - additional structured fields per call site

use crate::{TelemetryConfig, TelemetryError};

/// Structured logger handle.
pub struct StructuredLogger {
    _initialized: bool,
}

/// Initialize structured logging. Call once at process startup, after
/// `tracing_subscriber` has been installed by `init_telemetry`.
pub fn init_logging(config: &TelemetryConfig) -> Result<StructuredLogger, TelemetryError> {
    tracing::debug!(
        component = %config.component,
        json_logs = config.json_logs,
        "structured logging configured"
    );

    Ok(StructuredLogger { _initialized: true })
}

/// Log a sheet-related event with standard fields.
#[macro_export]
macro_rules! log_sheet_event {
    ($level:ident, $msg:expr, $sheet_id:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            sheet_id = %$sheet_id,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a ledger-block-related event with standard fields.
#[macro_export]
macro_rules! log_block_event {
    ($level:ident, $msg:expr, $block_index:expr, $block_kind:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            block_index = $block_index,
            block_kind = ?$block_kind,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log an intervention-related event with standard fields.
#[macro_export]
macro_rules! log_intervention_event {
    ($level:ident, $msg:expr, $intervention_id:expr, $priority:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            intervention_id = %$intervention_id,
            priority = ?$priority,
            $($($field)*,)?
            $msg
        )
    };
}

#[cfg(test)]
mod tests {
    // Logging tests require inspecting the global subscriber; covered by
    // integration tests instead.
}
