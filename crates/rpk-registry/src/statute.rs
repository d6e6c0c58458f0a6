//! # Statute Hooks
//!
//! Mutation points for the external statute monitor. The monitor scans
//! authoritative sources per jurisdiction and reports findings; the
//! registry records content digests, flags the active pack for re-review
//! and can start a `scheduled` regression run. Scraping and diffing of legal
//! text stay outside this crate.

use std::future::Future;
use std::pin::Pin;

use chrono::Utc;
use rpk_core::{RulepackId, RunId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::RegistryError;
use crate::metadata::{MetadataPatch, StatuteDigest};
use crate::registry::RulepackRegistry;
use crate::regression::RunType;
use crate::rulepack::Rulepack;

/// Failure of a statute scan as a whole.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("statute scan failed: {0}")]
pub struct StatuteScanError(pub String);

/// Outcome of scanning one jurisdiction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    /// Source content was fetched and hashed.
    Updated,
    /// Source could not be scanned.
    Failed,
}

/// One jurisdiction's scan result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatuteFinding {
    /// Jurisdiction scanned.
    pub jurisdiction: String,
    /// Scan outcome.
    pub status: FindingStatus,
    /// Digest of the fetched content, when updated.
    #[serde(default)]
    pub digest: Option<String>,
    /// Source URL or identifier.
    #[serde(default)]
    pub source: Option<String>,
    /// Error detail, when failed.
    #[serde(default)]
    pub detail: Option<String>,
}

/// Future returned by [`StatuteMonitor::scan`].
pub type ScanFuture =
    Pin<Box<dyn Future<Output = Result<Vec<StatuteFinding>, StatuteScanError>> + Send>>;

/// External collaborator that scans statute sources.
pub trait StatuteMonitor: Send + Sync {
    /// Scan every monitored jurisdiction once.
    fn scan(&self) -> ScanFuture;
}

/// Monitor that never reports anything. Used when no monitor is wired and
/// findings arrive by push instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStatuteMonitor;

impl StatuteMonitor for NoopStatuteMonitor {
    fn scan(&self) -> ScanFuture {
        Box::pin(async { Ok(Vec::new()) })
    }
}

/// What applying a batch of findings did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatuteScanReport {
    /// Packs flagged for review.
    pub flagged: Vec<RulepackId>,
    /// Regression runs started.
    pub runs_started: Vec<RunId>,
    /// Jurisdictions whose digest did not change.
    pub unchanged: Vec<String>,
    /// Jurisdictions without an active pack.
    pub skipped: Vec<String>,
    /// Jurisdictions whose scan or processing failed.
    pub failed: Vec<String>,
}

impl RulepackRegistry {
    /// Append `digest` to the active pack's history.
    ///
    /// Returns whether it differs from the most recent recorded digest.
    pub fn record_statute_digest(
        &self,
        jurisdiction: &str,
        digest: &str,
    ) -> Result<bool, RegistryError> {
        let active = self.require_active(jurisdiction)?;
        let digest = digest.trim().to_string();
        if digest.is_empty() {
            return Err(RegistryError::Validation("statute digest must be non-empty".into()));
        }
        let mut changed = false;
        self.rulepacks.update(&active.id, |pack| {
            changed = pack.metadata.latest_statute_digest() != Some(digest.as_str());
            pack.metadata.merge(MetadataPatch {
                statute_digests: vec![StatuteDigest {
                    digest: digest.clone(),
                    recorded_at: Utc::now(),
                }],
                ..Default::default()
            });
        });
        Ok(changed)
    }

    /// Flag the active general-channel pack for re-review, optionally
    /// starting a `scheduled` regression run.
    pub fn flag_statute_change(
        &self,
        jurisdiction: &str,
        trigger_regression: bool,
    ) -> Result<(RulepackId, Option<RunId>), RegistryError> {
        let active = self.require_active(jurisdiction)?;
        self.rulepacks.update(&active.id, |pack| {
            pack.metadata.merge(MetadataPatch {
                pending_statute_review: Some(true),
                ..Default::default()
            });
        });
        tracing::info!(
            rulepack_id = %active.id,
            jurisdiction = %active.jurisdiction,
            version = %active.version,
            "rulepack flagged for statute review"
        );
        let run_id = if trigger_regression {
            Some(self.run(&active.id, RunType::Scheduled, Some("statute-monitor".into()))?)
        } else {
            None
        };
        Ok((active.id, run_id))
    }

    /// Clear the review flag after a reviewer has looked at the change.
    pub fn clear_statute_review(&self, id: &RulepackId) -> Result<Rulepack, RegistryError> {
        let pack = self
            .rulepacks
            .update(id, |pack| {
                pack.metadata.merge(MetadataPatch {
                    pending_statute_review: Some(false),
                    ..Default::default()
                });
            })
            .ok_or_else(|| RegistryError::NotFound(format!("rulepack {id}")))?;
        tracing::info!(rulepack_id = %id, jurisdiction = %pack.jurisdiction, "statute review cleared");
        Ok(pack)
    }

    /// Apply a batch of findings. Per-jurisdiction failures are logged and
    /// skipped.
    pub fn apply_statute_findings(
        &self,
        findings: &[StatuteFinding],
        trigger_regression: bool,
    ) -> StatuteScanReport {
        let mut report = StatuteScanReport::default();
        for finding in findings {
            let jurisdiction = finding.jurisdiction.as_str();
            if finding.status == FindingStatus::Failed {
                tracing::warn!(
                    jurisdiction = %jurisdiction,
                    detail = finding.detail.as_deref().unwrap_or(""),
                    "statute source scan failed"
                );
                report.failed.push(finding.jurisdiction.clone());
                continue;
            }
            match self.apply_finding(finding, trigger_regression) {
                Ok(Some((id, run))) => {
                    report.flagged.push(id);
                    report.runs_started.extend(run);
                }
                Ok(None) => report.unchanged.push(finding.jurisdiction.clone()),
                Err(RegistryError::NotFound(_)) => {
                    tracing::debug!(jurisdiction = %jurisdiction, "no active rulepack for statute finding");
                    report.skipped.push(finding.jurisdiction.clone());
                }
                Err(err) => {
                    tracing::warn!(jurisdiction = %jurisdiction, error = %err, "statute finding could not be applied, skipping");
                    report.failed.push(finding.jurisdiction.clone());
                }
            }
        }
        report
    }

    fn apply_finding(
        &self,
        finding: &StatuteFinding,
        trigger_regression: bool,
    ) -> Result<Option<(RulepackId, Option<RunId>)>, RegistryError> {
        if let Some(digest) = &finding.digest {
            if !self.record_statute_digest(&finding.jurisdiction, digest)? {
                return Ok(None);
            }
        }
        self.flag_statute_change(&finding.jurisdiction, trigger_regression)
            .map(Some)
    }

    fn require_active(&self, jurisdiction: &str) -> Result<Rulepack, RegistryError> {
        self.get_active(jurisdiction)?.ok_or_else(|| {
            RegistryError::NotFound(format!("no active rulepack for jurisdiction {jurisdiction}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistryConfig;
    use crate::evaluator::UnconfiguredEvaluator;
    use crate::lifecycle::{ActivateOptions, InstallRequest};
    use crate::snapshot::InMemorySnapshotRepository;
    use serde_json::json;
    use std::sync::Arc;

    fn registry_with_active(jurisdiction: &str) -> (RulepackRegistry, RulepackId) {
        let reg = RulepackRegistry::new(
            Arc::new(InMemorySnapshotRepository::new()),
            Arc::new(UnconfiguredEvaluator),
            RegistryConfig::default(),
        );
        let id = reg
            .install(
                InstallRequest {
                    jurisdiction: jurisdiction.into(),
                    version: Some("1.0.0".into()),
                    rule_data: json!({"rate": 0.2}),
                    ..Default::default()
                },
                "alice",
            )
            .unwrap();
        reg.activate(
            &id,
            "bob",
            ActivateOptions {
                allow_override: true,
                ..Default::default()
            },
        )
        .unwrap();
        (reg, id)
    }

    fn updated(jurisdiction: &str, digest: &str) -> StatuteFinding {
        StatuteFinding {
            jurisdiction: jurisdiction.into(),
            status: FindingStatus::Updated,
            digest: Some(digest.into()),
            source: None,
            detail: None,
        }
    }

    #[test]
    fn digest_change_detection() {
        let (reg, id) = registry_with_active("GB");
        assert!(reg.record_statute_digest("GB", "aa").unwrap());
        assert!(!reg.record_statute_digest("GB", "aa").unwrap());
        assert!(reg.record_statute_digest("GB", "bb").unwrap());
        assert_eq!(reg.get(&id).unwrap().metadata.statute_digests.len(), 2);
    }

    #[test]
    fn digest_returning_to_earlier_value_is_one_change() {
        let (reg, id) = registry_with_active("GB");
        let changed: Vec<bool> = ["A", "B", "A", "A", "A"]
            .into_iter()
            .map(|d| reg.record_statute_digest("GB", d).unwrap())
            .collect();
        assert_eq!(changed, vec![true, true, true, false, false]);
        let meta = reg.get(&id).unwrap().metadata;
        let history: Vec<_> = meta.statute_digests.iter().map(|d| d.digest.as_str()).collect();
        assert_eq!(history, vec!["A", "B", "A"]);
        assert_eq!(meta.latest_statute_digest(), Some("A"));
    }

    #[test]
    fn hooks_require_an_active_pack() {
        let (reg, _) = registry_with_active("GB");
        assert_eq!(
            reg.record_statute_digest("FR", "aa").unwrap_err().kind(),
            "NOT_FOUND"
        );
        assert_eq!(
            reg.flag_statute_change("FR", false).unwrap_err().kind(),
            "NOT_FOUND"
        );
    }

    #[test]
    fn flag_and_clear_review() {
        let (reg, id) = registry_with_active("GB");
        let (flagged, run) = reg.flag_statute_change("GB", false).unwrap();
        assert_eq!(flagged, id);
        assert!(run.is_none());
        assert!(reg.get(&id).unwrap().metadata.pending_statute_review);
        let pack = reg.clear_statute_review(&id).unwrap();
        assert!(!pack.metadata.pending_statute_review);
    }

    #[tokio::test]
    async fn findings_are_applied_per_jurisdiction() {
        let (reg, id) = registry_with_active("GB");
        reg.record_statute_digest("GB", "old").unwrap();
        let findings = vec![
            updated("GB", "new"),
            updated("FR", "x"),
            StatuteFinding {
                jurisdiction: "DE".into(),
                status: FindingStatus::Failed,
                digest: None,
                source: None,
                detail: Some("timeout".into()),
            },
        ];
        let report = reg.apply_statute_findings(&findings, true);
        assert_eq!(report.flagged, vec![id]);
        assert_eq!(report.runs_started.len(), 1);
        assert_eq!(report.skipped, vec!["FR".to_string()]);
        assert_eq!(report.failed, vec!["DE".to_string()]);

        let again = reg.apply_statute_findings(&[updated("GB", "new")], false);
        assert_eq!(again.unchanged, vec!["GB".to_string()]);
        assert!(again.flagged.is_empty());
    }

    #[tokio::test]
    async fn oscillating_source_stops_triggering_once_stable() {
        let (reg, id) = registry_with_active("GB");
        let mut runs = 0;
        let mut flagged = 0;
        for digest in ["A", "B", "A", "A", "A"] {
            let report = reg.apply_statute_findings(&[updated("GB", digest)], true);
            runs += report.runs_started.len();
            flagged += report.flagged.len();
        }
        assert_eq!(flagged, 3);
        assert_eq!(runs, 3);
        assert_eq!(reg.runs_for(&id).len(), 3);
    }

    #[tokio::test]
    async fn noop_monitor_reports_nothing() {
        assert!(NoopStatuteMonitor.scan().await.unwrap().is_empty());
    }
}
