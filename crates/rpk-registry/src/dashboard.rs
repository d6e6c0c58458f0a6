//! Fleet-wide regression health. Read-only.

use rpk_core::{JurisdictionId, RulepackId, RunId, SemVer};
use serde::{Deserialize, Serialize};

use crate::registry::RulepackRegistry;
use crate::regression::RunStatus;
use crate::rulepack::RulepackStatus;

/// A rulepack whose latest run did not pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailingRulepack {
    /// Rulepack.
    pub rulepack_id: RulepackId,
    /// Jurisdiction.
    pub jurisdiction: JurisdictionId,
    /// Version.
    pub version: SemVer,
    /// Latest run.
    pub run_id: RunId,
    /// Its status.
    pub status: RunStatus,
    /// Its pass rate.
    pub pass_rate: f64,
}

/// Dashboard overview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryOverview {
    /// All rulepacks.
    pub total_rulepacks: usize,
    /// Rulepacks in status `active` (either channel).
    pub active_rulepacks: usize,
    /// Rulepacks flagged for statute review.
    pub pending_statute_review: usize,
    /// Mean pass rate of the most recent completed runs; `None` before any run completes.
    pub recent_pass_rate: Option<f64>,
    /// Number of runs that went into `recent_pass_rate`.
    pub recent_runs: usize,
    /// Rulepacks whose latest completed run did not pass, worst first.
    pub failing: Vec<FailingRulepack>,
}

impl RulepackRegistry {
    /// Aggregate regression health across the fleet.
    pub fn overview(&self) -> RegistryOverview {
        let packs = self.rulepacks.list();

        let mut completed = self.runs.filter(|r| r.is_complete());
        completed.sort_by(|a, b| b.completed_at.cmp(&a.completed_at).then(b.sequence.cmp(&a.sequence)));
        completed.truncate(self.config.dashboard_window);
        let recent_pass_rate = (!completed.is_empty()).then(|| {
            completed.iter().map(|r| r.pass_rate()).sum::<f64>() / completed.len() as f64
        });

        let mut failing: Vec<FailingRulepack> = packs
            .iter()
            .filter_map(|pack| {
                let run = self.latest_run(&pack.id)?;
                if !run.is_complete() || run.status == RunStatus::Passed {
                    return None;
                }
                Some(FailingRulepack {
                    rulepack_id: pack.id,
                    jurisdiction: pack.jurisdiction.clone(),
                    version: pack.version,
                    run_id: run.id,
                    status: run.status,
                    pass_rate: run.pass_rate(),
                })
            })
            .collect();
        failing.sort_by(|a, b| a.pass_rate.total_cmp(&b.pass_rate));

        RegistryOverview {
            total_rulepacks: packs.len(),
            active_rulepacks: packs
                .iter()
                .filter(|p| p.status == RulepackStatus::Active)
                .count(),
            pending_statute_review: packs
                .iter()
                .filter(|p| p.metadata.pending_statute_review)
                .count(),
            recent_pass_rate,
            recent_runs: completed.len(),
            failing,
        }
    }
}
