//! # Rulepack Metadata
//!
//! Metadata is a fixed set of typed sub-records. Partial updates go through
//! [`MetadataPatch`] and [`RulepackMetadata::merge`], which applies exactly
//! one rule per field:
//!
//! | Field                    | Rule                      |
//! |--------------------------|---------------------------|
//! | `approvals`              | append                    |
//! | `statute_digests`        | append unless equal to last |
//! | `canary`                 | replace when present      |
//! | `regression_quality`     | replace when present      |
//! | `notifications`          | replace when present      |
//! | scalar strings, `authors`| replace when present      |
//! | `pending_statute_review` | replace when present      |
//!
//! An unset patch field never clears an existing value.

use chrono::{DateTime, Utc};
use rpk_core::{RunId, VersionBump};
use serde::{Deserialize, Serialize};

use crate::canary::CanaryPlan;

/// Outcome recorded in an approval log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Submitted for approval.
    Submitted,
    /// Approved and activated.
    Approved,
    /// Sent back to draft.
    Rejected,
}

/// Append-only approval log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    /// Who acted.
    pub reviewer_id: String,
    /// What they did.
    pub status: ApprovalStatus,
    /// Free-form notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// Review checklist items confirmed on submission.
    #[serde(default)]
    pub checklist: Vec<String>,
    /// When.
    pub timestamp: DateTime<Utc>,
}

/// Whether the latest regression run opens the activation gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatingStatus {
    /// Latest run passed at or above the threshold.
    Passing,
    /// Latest run did not pass, or passed below the threshold.
    Blocked,
    /// Latest run still executing.
    Pending,
}

/// Denormalized summary of the latest regression run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionQuality {
    /// Latest run.
    pub last_run_id: RunId,
    /// Its pass rate.
    pub pass_rate: f64,
    /// Number of vectors it covered.
    pub coverage: usize,
    /// Gate verdict.
    pub gating_status: GatingStatus,
    /// Completion time, or start time while running.
    pub last_run_at: DateTime<Utc>,
}

/// Who is told about this pack's regression and statute events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPrefs {
    /// Addresses or channel names.
    #[serde(default)]
    pub recipients: Vec<String>,
    /// Notify when a regression run does not pass.
    #[serde(default)]
    pub on_regression_failure: bool,
    /// Notify when the statute monitor flags the pack.
    #[serde(default)]
    pub on_statute_change: bool,
}

/// Digest of an upstream statute text observed by the monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatuteDigest {
    /// Hex digest of the statute content.
    pub digest: String,
    /// Observation time.
    pub recorded_at: DateTime<Utc>,
}

/// Typed rulepack metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RulepackMetadata {
    /// Summary of the change.
    pub description: Option<String>,
    /// Authors of the rule data.
    pub authors: Vec<String>,
    /// Source-control reference (commit, tag, URL).
    pub source_ref: Option<String>,
    /// Snapshot repository reference recorded at install.
    pub snapshot_ref: Option<String>,
    /// Change type used to derive the version.
    pub change_type: Option<VersionBump>,
    /// Approval log.
    pub approvals: Vec<ApprovalRecord>,
    /// Canary plan, if one was scheduled.
    pub canary: Option<CanaryPlan>,
    /// Statute digest history, oldest first.
    pub statute_digests: Vec<StatuteDigest>,
    /// Summary of the latest regression run.
    pub regression_quality: Option<RegressionQuality>,
    /// Notification preferences.
    pub notifications: NotificationPrefs,
    /// Set by the statute monitor until a reviewer clears it.
    pub pending_statute_review: bool,
}

/// Partial metadata update. Every field is optional or additive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataPatch {
    /// Replaces the description.
    pub description: Option<String>,
    /// Replaces the author list.
    pub authors: Option<Vec<String>>,
    /// Replaces the source reference.
    pub source_ref: Option<String>,
    /// Replaces the snapshot reference.
    pub snapshot_ref: Option<String>,
    /// Replaces the change type.
    pub change_type: Option<VersionBump>,
    /// Appended to the approval log.
    pub approvals: Vec<ApprovalRecord>,
    /// Replaces the canary plan.
    pub canary: Option<CanaryPlan>,
    /// Appended to the digest history, skipping known digests.
    pub statute_digests: Vec<StatuteDigest>,
    /// Replaces the regression summary.
    pub regression_quality: Option<RegressionQuality>,
    /// Replaces the notification preferences.
    pub notifications: Option<NotificationPrefs>,
    /// Replaces the review flag.
    pub pending_statute_review: Option<bool>,
}

impl MetadataPatch {
    /// Names of the fields set in this patch that only the registry writes.
    pub fn registry_managed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.snapshot_ref.is_some() {
            fields.push("snapshot_ref");
        }
        if !self.approvals.is_empty() {
            fields.push("approvals");
        }
        if self.canary.is_some() {
            fields.push("canary");
        }
        if !self.statute_digests.is_empty() {
            fields.push("statute_digests");
        }
        if self.regression_quality.is_some() {
            fields.push("regression_quality");
        }
        if self.pending_statute_review.is_some() {
            fields.push("pending_statute_review");
        }
        fields
    }
}

impl RulepackMetadata {
    /// Apply `patch`, one rule per field.
    pub fn merge(&mut self, patch: MetadataPatch) {
        replace(&mut self.description, patch.description);
        if let Some(authors) = patch.authors {
            self.authors = authors;
        }
        replace(&mut self.source_ref, patch.source_ref);
        replace(&mut self.snapshot_ref, patch.snapshot_ref);
        replace(&mut self.change_type, patch.change_type);
        self.approvals.extend(patch.approvals);
        replace(&mut self.canary, patch.canary);
        for digest in patch.statute_digests {
            if self.latest_statute_digest() != Some(digest.digest.as_str()) {
                self.statute_digests.push(digest);
            }
        }
        replace(&mut self.regression_quality, patch.regression_quality);
        if let Some(prefs) = patch.notifications {
            self.notifications = prefs;
        }
        if let Some(flag) = patch.pending_statute_review {
            self.pending_statute_review = flag;
        }
    }

    /// Most recently recorded statute digest.
    pub fn latest_statute_digest(&self) -> Option<&str> {
        self.statute_digests.last().map(|d| d.digest.as_str())
    }
}

fn replace<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canary::{CanaryPlan, CanaryStatus};

    fn approval(status: ApprovalStatus) -> ApprovalRecord {
        ApprovalRecord {
            reviewer_id: "alice".into(),
            status,
            notes: None,
            checklist: vec![],
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn approvals_append() {
        let mut meta = RulepackMetadata::default();
        meta.merge(MetadataPatch {
            approvals: vec![approval(ApprovalStatus::Submitted)],
            ..Default::default()
        });
        meta.merge(MetadataPatch {
            approvals: vec![approval(ApprovalStatus::Approved)],
            ..Default::default()
        });
        let statuses: Vec<_> = meta.approvals.iter().map(|a| a.status).collect();
        assert_eq!(statuses, vec![ApprovalStatus::Submitted, ApprovalStatus::Approved]);
    }

    #[test]
    fn empty_patch_changes_nothing() {
        let mut meta = RulepackMetadata {
            description: Some("VAT 2025".into()),
            authors: vec!["bob".into()],
            pending_statute_review: true,
            canary: Some(CanaryPlan::planned(["t1".to_string()], 10, None, None)),
            ..Default::default()
        };
        let before = meta.clone();
        meta.merge(MetadataPatch::default());
        assert_eq!(meta, before);
    }

    #[test]
    fn canary_is_replaced() {
        let mut meta = RulepackMetadata {
            canary: Some(CanaryPlan::planned(["t1".to_string()], 10, None, None)),
            ..Default::default()
        };
        let mut next = CanaryPlan::planned(["t2".to_string()], 50, None, None);
        next.status = CanaryStatus::Active;
        meta.merge(MetadataPatch {
            canary: Some(next.clone()),
            ..Default::default()
        });
        assert_eq!(meta.canary, Some(next));
    }

    #[test]
    fn statute_digests_skip_repeats_of_latest() {
        let mut meta = RulepackMetadata::default();
        let d = |s: &str| StatuteDigest {
            digest: s.into(),
            recorded_at: Utc::now(),
        };
        meta.merge(MetadataPatch {
            statute_digests: vec![d("aa"), d("bb")],
            ..Default::default()
        });
        meta.merge(MetadataPatch {
            statute_digests: vec![d("bb"), d("cc")],
            ..Default::default()
        });
        meta.merge(MetadataPatch {
            statute_digests: vec![d("aa"), d("aa")],
            ..Default::default()
        });
        let digests: Vec<_> = meta.statute_digests.iter().map(|d| d.digest.as_str()).collect();
        assert_eq!(digests, vec!["aa", "bb", "cc", "aa"]);
        assert_eq!(meta.latest_statute_digest(), Some("aa"));
    }

    #[test]
    fn review_flag_replaces_when_present() {
        let mut meta = RulepackMetadata::default();
        meta.merge(MetadataPatch {
            pending_statute_review: Some(true),
            ..Default::default()
        });
        assert!(meta.pending_statute_review);
        meta.merge(MetadataPatch {
            pending_statute_review: Some(false),
            ..Default::default()
        });
        assert!(!meta.pending_statute_review);
    }

    #[test]
    fn managed_fields_are_reported() {
        let patch = MetadataPatch {
            description: Some("ok".into()),
            approvals: vec![approval(ApprovalStatus::Approved)],
            pending_statute_review: Some(false),
            ..Default::default()
        };
        assert_eq!(
            patch.registry_managed_fields(),
            vec!["approvals", "pending_statute_review"]
        );
        assert!(MetadataPatch::default().registry_managed_fields().is_empty());
    }

    #[test]
    fn patch_deserializes_from_partial_json() {
        let patch: MetadataPatch =
            serde_json::from_value(serde_json::json!({"description": "x"})).unwrap();
        assert_eq!(patch.description.as_deref(), Some("x"));
        assert!(patch.authors.is_none());
    }
}
