//! Orchestrator-level configuration (§6.4).

use std::time::Duration;

/// Tunables for the per-sheet pipeline driver.
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    /// Wall-clock budget from ingest to `FINALIZED`, excluding time spent
    /// waiting on a human gate. Expiry opens a `critical` intervention and
    /// halts the sheet's worker (§5).
    pub sheet_deadline: Duration,
    /// Size of the worker-pool bound (`tokio::sync::Semaphore` permits).
    /// Default: 4x CPU cores, per §5's "thread pool or goroutine pool of
    /// size W".
    pub worker_permits: usize,
    /// Bound on `ChainStale` retry-and-reappend attempts before an append
    /// surfaces as `LedgerContention` (§7: "retried internally by the
    /// orchestrator up to a small bound, then surfaces as `Internal`").
    pub ledger_contention_retries: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            sheet_deadline: Duration::from_secs(600),
            worker_permits: 4 * num_cpus::get(),
            ledger_contention_retries: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_worker_permits_scales_with_cores() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.worker_permits, 4 * num_cpus::get());
    }
}
