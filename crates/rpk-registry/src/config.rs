//! Registry tunables.

use std::time::Duration;

/// Thresholds and limits used by the registry core.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Minimum pass rate of the latest run required to open the activation gate.
    pub min_pass_rate: f64,
    /// Upper bound on a single evaluator call.
    pub evaluator_timeout: Duration,
    /// A `running` run older than this is expired by reconciliation.
    pub stale_run_after: Duration,
    /// Number of most recent completed runs the dashboard averages over.
    pub dashboard_window: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            min_pass_rate: 0.99,
            evaluator_timeout: Duration::from_secs(30),
            stale_run_after: Duration::from_secs(60 * 60),
            dashboard_window: 25,
        }
    }
}
