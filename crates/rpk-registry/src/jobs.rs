//! # Scheduled Jobs
//!
//! Two independent timers, both off the request path:
//!
//! - a daily regression sweep at a fixed UTC hour that starts a `scheduled`
//!   run for every active rulepack and then expires stale runs;
//! - a statute scan every N hours that asks the [`StatuteMonitor`] for
//!   findings and applies them.
//!
//! One rulepack's or jurisdiction's failure is logged and skipped; it never
//! aborts the rest of a sweep.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rpk_core::RunId;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::registry::RulepackRegistry;
use crate::regression::RunType;
use crate::rulepack::RulepackStatus;
use crate::statute::{StatuteMonitor, StatuteScanError, StatuteScanReport};

/// What one regression sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Runs started.
    pub started: Vec<RunId>,
    /// Rulepacks whose run could not be started.
    pub failed: usize,
    /// Stale runs expired.
    pub expired: Vec<RunId>,
}

/// Background job driver.
#[derive(Clone)]
pub struct RegistryJobs {
    registry: RulepackRegistry,
    monitor: Arc<dyn StatuteMonitor>,
    sweep_hour_utc: u32,
    scan_interval: Duration,
}

impl RegistryJobs {
    /// Create a driver. `sweep_hour_utc` is taken modulo 24.
    pub fn new(
        registry: RulepackRegistry,
        monitor: Arc<dyn StatuteMonitor>,
        sweep_hour_utc: u32,
        scan_interval: Duration,
    ) -> Self {
        Self {
            registry,
            monitor,
            sweep_hour_utc: sweep_hour_utc % 24,
            scan_interval,
        }
    }

    /// Start a `scheduled` run for every active rulepack, then expire stale runs.
    pub fn run_regression_sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();
        let active = self
            .registry
            .rulepacks
            .filter(|p| p.status == RulepackStatus::Active);
        for pack in active {
            match self
                .registry
                .run(&pack.id, RunType::Scheduled, Some("nightly-sweep".into()))
            {
                Ok(run_id) => report.started.push(run_id),
                Err(err) => {
                    tracing::warn!(
                        rulepack_id = %pack.id,
                        jurisdiction = %pack.jurisdiction,
                        error = %err,
                        "scheduled regression could not be started, skipping"
                    );
                    report.failed += 1;
                }
            }
        }
        report.expired = self.registry.expire_stale_runs(now);
        tracing::info!(
            started = report.started.len(),
            failed = report.failed,
            expired = report.expired.len(),
            "regression sweep finished"
        );
        report
    }

    /// Ask the monitor for findings and apply them.
    pub async fn run_statute_scan(&self) -> Result<StatuteScanReport, StatuteScanError> {
        let findings = self.monitor.scan().await?;
        let report = self.registry.apply_statute_findings(&findings, true);
        tracing::info!(
            findings = findings.len(),
            flagged = report.flagged.len(),
            failed = report.failed.len(),
            "statute scan finished"
        );
        Ok(report)
    }

    /// Spawn both timers on the current runtime.
    pub fn spawn(self) -> Vec<JoinHandle<()>> {
        let sweeper = self.clone();
        let sweep = tokio::spawn(async move {
            loop {
                let wait = duration_until_next(sweeper.sweep_hour_utc, Utc::now());
                tokio::time::sleep(wait).await;
                sweeper.run_regression_sweep(Utc::now());
            }
        });

        let scanner = self;
        let scan = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(scanner.scan_interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(err) = scanner.run_statute_scan().await {
                    tracing::warn!(error = %err, "statute scan failed");
                }
            }
        });
        vec![sweep, scan]
    }
}

/// Time from `now` until the next occurrence of `hour:00:00` UTC.
pub fn duration_until_next(hour: u32, now: DateTime<Utc>) -> Duration {
    let today = now
        .date_naive()
        .and_hms_opt(hour % 24, 0, 0)
        .map(|t| t.and_utc());
    let next = match today {
        Some(t) if t > now => t,
        Some(t) => t + chrono::Duration::days(1),
        None => now + chrono::Duration::days(1),
    };
    (next - now).to_std().unwrap_or(Duration::from_secs(0))
}
