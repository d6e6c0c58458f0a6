//! # Rulepack State Machine
//!
//! Install, submission, approval, activation, rejection and archival.
//!
//! ## Activation
//!
//! Unless overridden, activation requires the latest regression run to have
//! passed with a pass rate at or above the configured threshold; otherwise
//! it fails with a policy error.
//!
//! A general-channel activation deprecates every other active pack of the
//! jurisdiction, activates the target and completes any live canary plan of
//! the jurisdiction inside one write transaction on the rulepack store, so
//! no reader ever observes zero or two general-channel active packs.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rpk_core::{checksum_of, JurisdictionId, RulepackId, SemVer, VersionBump};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::canary::{CanaryPlan, CanaryStatus};
use crate::error::RegistryError;
use crate::metadata::{ApprovalRecord, ApprovalStatus, MetadataPatch, RulepackMetadata};
use crate::registry::RulepackRegistry;
use crate::regression::{RegressionRun, RunStatus};
use crate::rulepack::{RegressionTest, ReleaseChannel, Rulepack, RulepackStatus};
use crate::snapshot::SnapshotStatus;
use crate::version::validate_semver;

/// Install-time options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallOptions {
    /// Bump used when no version is given (minor when absent).
    pub change_type: Option<VersionBump>,
    /// Recorded as the metadata description.
    pub description: Option<String>,
    /// Recorded as the metadata source reference.
    pub source_ref: Option<String>,
}

/// Input to [`RulepackRegistry::install`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallRequest {
    /// Jurisdiction identifier.
    pub jurisdiction: String,
    /// Explicit version; derived from `options.change_type` when absent.
    #[serde(default)]
    pub version: Option<String>,
    /// Opaque rule payload. Required.
    #[serde(default)]
    pub rule_data: Value,
    /// Caller-supplied metadata.
    #[serde(default)]
    pub metadata: MetadataPatch,
    /// Regression vectors.
    #[serde(default)]
    pub regression_tests: Vec<RegressionTest>,
    /// Start of legal effect.
    #[serde(default)]
    pub effective_from: Option<DateTime<Utc>>,
    /// End of legal effect.
    #[serde(default)]
    pub effective_to: Option<DateTime<Utc>>,
    /// Install options.
    #[serde(default)]
    pub options: InstallOptions,
}

/// Options for [`RulepackRegistry::activate`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivateOptions {
    /// Start of legal effect; activation time when absent.
    pub effective_from: Option<DateTime<Utc>>,
    /// Channel to activate on.
    pub release_channel: ReleaseChannel,
    /// Bypass the regression gate.
    pub allow_override: bool,
}

/// Options for [`RulepackRegistry::approve`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApproveOptions {
    /// Reviewer notes recorded on the approval entry.
    #[serde(default)]
    pub notes: Option<String>,
    /// Activation options.
    #[serde(flatten)]
    pub activation: ActivateOptions,
}

impl RulepackRegistry {
    /// Install a new draft rulepack. Never overwrites an existing version.
    pub fn install(
        &self,
        request: InstallRequest,
        created_by: &str,
    ) -> Result<RulepackId, RegistryError> {
        let jurisdiction = JurisdictionId::new(request.jurisdiction.as_str())?;
        if request.rule_data.is_null() {
            return Err(RegistryError::Validation("rule_data is required".into()));
        }
        if let (Some(from), Some(to)) = (request.effective_from, request.effective_to) {
            if to <= from {
                return Err(RegistryError::Validation(
                    "effective_to must be after effective_from".into(),
                ));
            }
        }
        let managed = request.metadata.registry_managed_fields();
        if !managed.is_empty() {
            return Err(RegistryError::Validation(format!(
                "metadata fields managed by the registry cannot be supplied: {}",
                managed.join(", ")
            )));
        }
        let regression_tests = assign_test_ids(request.regression_tests)?;

        let change_type = request.options.change_type.unwrap_or_default();
        let explicit = request.version.is_some();
        let version = match request.version.as_deref() {
            Some(v) => validate_semver(v.trim())?,
            None => self.suggest_next(jurisdiction.as_str(), change_type)?,
        };
        if self.version_exists(&jurisdiction, &version) {
            return Err(duplicate_version(&jurisdiction, &version));
        }

        let checksum = checksum_of(&request.rule_data)?;
        let duplicates = self.find_by_checksum(jurisdiction.as_str(), &checksum)?;
        if let Some(existing) = duplicates.first() {
            tracing::warn!(
                jurisdiction = %jurisdiction,
                version = %version,
                existing_version = %existing.version,
                checksum = %checksum,
                "rule data already installed under another version"
            );
        }

        let receipt = self
            .snapshots
            .persist_snapshot(&jurisdiction, &version, &request.rule_data)?;
        if receipt.status == SnapshotStatus::Unchanged {
            tracing::debug!(jurisdiction = %jurisdiction, version = %version, "snapshot already present");
        }

        let mut metadata = RulepackMetadata::default();
        metadata.merge(request.metadata);
        metadata.merge(MetadataPatch {
            description: request.options.description,
            source_ref: request.options.source_ref,
            snapshot_ref: Some(receipt.reference),
            change_type: (!explicit).then_some(change_type),
            ..Default::default()
        });

        let id = RulepackId::new();
        let pack = Rulepack {
            id,
            jurisdiction_code: jurisdiction.code(),
            jurisdiction: jurisdiction.clone(),
            version,
            status: RulepackStatus::Draft,
            is_active: false,
            release_channel: None,
            checksum,
            effective_from: request.effective_from,
            effective_to: request.effective_to,
            rule_data: request.rule_data,
            metadata,
            regression_tests,
            approved_by: None,
            approved_at: None,
            created_by: created_by.to_string(),
            created_at: Utc::now(),
        };

        self.rulepacks.transact(|map| {
            let taken = map
                .values()
                .any(|p| p.jurisdiction == jurisdiction && p.version == version);
            if taken {
                return Err(duplicate_version(&jurisdiction, &version));
            }
            map.insert(id, pack);
            Ok(())
        })?;

        tracing::info!(
            rulepack_id = %id,
            jurisdiction = %jurisdiction,
            version = %version,
            status = "draft",
            "rulepack installed"
        );
        Ok(id)
    }

    /// Move a draft (or re-submit a pending) pack to `pending_approval`.
    pub fn submit_for_approval(
        &self,
        id: &RulepackId,
        requested_by: &str,
        checklist: Vec<String>,
    ) -> Result<Rulepack, RegistryError> {
        let pack = self
            .rulepacks
            .try_update(id, |pack| {
                if !matches!(
                    pack.status,
                    RulepackStatus::Draft | RulepackStatus::PendingApproval
                ) {
                    return Err(illegal(pack, "submit for approval"));
                }
                pack.metadata.merge(MetadataPatch {
                    approvals: vec![ApprovalRecord {
                        reviewer_id: requested_by.to_string(),
                        status: ApprovalStatus::Submitted,
                        notes: None,
                        checklist,
                        timestamp: Utc::now(),
                    }],
                    ..Default::default()
                });
                pack.status = RulepackStatus::PendingApproval;
                Ok(pack.clone())
            })
            .ok_or_else(|| not_found(id))??;

        tracing::info!(rulepack_id = %id, jurisdiction = %pack.jurisdiction, version = %pack.version, status = %pack.status, "rulepack submitted for approval");
        Ok(pack)
    }

    /// Activate a pack on the general or canary channel.
    pub fn activate(
        &self,
        id: &RulepackId,
        approved_by: &str,
        opts: ActivateOptions,
    ) -> Result<Rulepack, RegistryError> {
        self.activate_with_record(id, approved_by, opts, None)
    }

    /// Activate and append an `approved` record carrying `opts.notes`.
    pub fn approve(
        &self,
        id: &RulepackId,
        approver_id: &str,
        opts: ApproveOptions,
    ) -> Result<Rulepack, RegistryError> {
        let record = ApprovalRecord {
            reviewer_id: approver_id.to_string(),
            status: ApprovalStatus::Approved,
            notes: opts.notes,
            checklist: Vec::new(),
            timestamp: Utc::now(),
        };
        self.activate_with_record(id, approver_id, opts.activation, Some(record))
    }

    /// Send a pending pack back to draft with a `rejected` record.
    pub fn reject(
        &self,
        id: &RulepackId,
        reviewer_id: &str,
        notes: Option<String>,
    ) -> Result<Rulepack, RegistryError> {
        let pack = self
            .rulepacks
            .try_update(id, |pack| {
                if pack.status != RulepackStatus::PendingApproval {
                    return Err(illegal(pack, "reject"));
                }
                pack.metadata.merge(MetadataPatch {
                    approvals: vec![ApprovalRecord {
                        reviewer_id: reviewer_id.to_string(),
                        status: ApprovalStatus::Rejected,
                        notes,
                        checklist: Vec::new(),
                        timestamp: Utc::now(),
                    }],
                    ..Default::default()
                });
                pack.status = RulepackStatus::Draft;
                Ok(pack.clone())
            })
            .ok_or_else(|| not_found(id))??;

        tracing::info!(rulepack_id = %id, jurisdiction = %pack.jurisdiction, version = %pack.version, status = %pack.status, "rulepack rejected");
        Ok(pack)
    }

    /// Retire a draft or deprecated pack.
    pub fn archive(&self, id: &RulepackId) -> Result<Rulepack, RegistryError> {
        let pack = self
            .rulepacks
            .try_update(id, |pack| {
                if !matches!(
                    pack.status,
                    RulepackStatus::Draft | RulepackStatus::Deprecated
                ) {
                    return Err(illegal(pack, "archive"));
                }
                pack.status = RulepackStatus::Archived;
                Ok(pack.clone())
            })
            .ok_or_else(|| not_found(id))??;

        tracing::info!(rulepack_id = %id, jurisdiction = %pack.jurisdiction, version = %pack.version, status = %pack.status, "rulepack archived");
        Ok(pack)
    }

    /// Merge caller-editable metadata (description, authors, source
    /// reference, notification preferences).
    pub fn update_metadata(
        &self,
        id: &RulepackId,
        patch: MetadataPatch,
    ) -> Result<Rulepack, RegistryError> {
        let managed = patch.registry_managed_fields();
        if !managed.is_empty() || patch.change_type.is_some() {
            let mut fields = managed;
            if patch.change_type.is_some() {
                fields.push("change_type");
            }
            return Err(RegistryError::Validation(format!(
                "metadata fields managed by the registry cannot be updated: {}",
                fields.join(", ")
            )));
        }
        self.rulepacks
            .update(id, |pack| pack.metadata.merge(patch))
            .ok_or_else(|| not_found(id))
    }

    fn activate_with_record(
        &self,
        id: &RulepackId,
        approved_by: &str,
        opts: ActivateOptions,
        record: Option<ApprovalRecord>,
    ) -> Result<Rulepack, RegistryError> {
        self.get(id)?;
        let now = Utc::now();
        let channel = opts.release_channel;

        let (pack, deprecated) = self.rulepacks.transact(|map| -> Result<(Rulepack, Vec<RulepackId>), RegistryError> {
            let target = map.get(id).ok_or_else(|| not_found(id))?;
            // One read of the run store serves both the gate and the recorded
            // quality. Run writers never hold the run lock while taking the
            // rulepack lock.
            let latest = self.latest_run(id);
            if !opts.allow_override {
                self.check_gate(id, latest.as_ref())?;
            }
            let quality = latest.as_ref().map(|run| self.quality_of(run));
            if target.status == RulepackStatus::Archived {
                return Err(illegal(target, "activate"));
            }
            if channel == ReleaseChannel::Canary && target.is_general_active() {
                return Err(RegistryError::IllegalState(format!(
                    "rulepack {id} is the live general-channel pack and cannot move to canary"
                )));
            }
            let jurisdiction = target.jurisdiction.clone();
            let canary_plan = match &target.metadata.canary {
                Some(plan) => CanaryPlan {
                    status: CanaryStatus::Active,
                    start_at: plan.start_at.or(Some(now)),
                    ..plan.clone()
                },
                None => CanaryPlan::full_rollout(now),
            };

            let mut deprecated = Vec::new();
            if channel == ReleaseChannel::General {
                for sibling in map.values_mut().filter(|p| p.jurisdiction == jurisdiction) {
                    if sibling.id != *id && sibling.is_active {
                        sibling.is_active = false;
                        sibling.status = RulepackStatus::Deprecated;
                        deprecated.push(sibling.id);
                    }
                    if let Some(plan) = sibling
                        .metadata
                        .canary
                        .as_ref()
                        .filter(|p| p.status == CanaryStatus::Active)
                    {
                        let completed = CanaryPlan {
                            status: CanaryStatus::Completed,
                            end_at: plan.end_at.or(Some(now)),
                            ..plan.clone()
                        };
                        sibling.metadata.merge(MetadataPatch {
                            canary: Some(completed),
                            ..Default::default()
                        });
                    }
                }
            }

            let target = map.get_mut(id).ok_or_else(|| not_found(id))?;
            target.status = RulepackStatus::Active;
            target.release_channel = Some(channel);
            target.is_active = channel == ReleaseChannel::General;
            target.approved_by = Some(approved_by.to_string());
            target.approved_at = Some(now);
            target.effective_from = Some(opts.effective_from.unwrap_or(now));
            target.metadata.merge(MetadataPatch {
                approvals: record.into_iter().collect(),
                regression_quality: quality,
                canary: (channel == ReleaseChannel::Canary).then_some(canary_plan),
                ..Default::default()
            });
            Ok((target.clone(), deprecated))
        })?;

        if opts.allow_override {
            tracing::warn!(rulepack_id = %id, approved_by = %approved_by, "regression gate overridden");
        }
        for sibling in &deprecated {
            tracing::info!(rulepack_id = %sibling, jurisdiction = %pack.jurisdiction, status = "deprecated", "rulepack deprecated by activation");
        }
        tracing::info!(
            rulepack_id = %id,
            jurisdiction = %pack.jurisdiction,
            version = %pack.version,
            channel = %channel,
            status = %pack.status,
            "rulepack activated"
        );
        Ok(pack)
    }

    fn check_gate(&self, id: &RulepackId, latest: Option<&RegressionRun>) -> Result<(), RegistryError> {
        let run = latest.ok_or_else(|| {
            RegistryError::Policy(format!("no regression run recorded for rulepack {id}"))
        })?;
        if run.status != RunStatus::Passed {
            return Err(RegistryError::Policy(format!(
                "latest regression run {} is {}",
                run.id, run.status
            )));
        }
        let rate = run.pass_rate();
        if rate < self.config.min_pass_rate {
            return Err(RegistryError::Policy(format!(
                "latest regression run {} pass rate {rate:.4} is below {:.2}",
                run.id, self.config.min_pass_rate
            )));
        }
        Ok(())
    }

    fn version_exists(&self, jurisdiction: &JurisdictionId, version: &SemVer) -> bool {
        self.rulepacks.read(|map| {
            map.values()
                .any(|p| &p.jurisdiction == jurisdiction && &p.version == version)
        })
    }
}

/// Give every vector a unique id, generating one where missing.
fn assign_test_ids(tests: Vec<RegressionTest>) -> Result<Vec<RegressionTest>, RegistryError> {
    let mut seen = HashSet::new();
    tests
        .into_iter()
        .map(|mut test| {
            let trimmed = test.id.trim();
            test.id = if trimmed.is_empty() {
                format!("test-{}", Uuid::new_v4())
            } else {
                trimmed.to_string()
            };
            if !seen.insert(test.id.clone()) {
                return Err(RegistryError::Validation(format!(
                    "duplicate regression test id {}",
                    test.id
                )));
            }
            Ok(test)
        })
        .collect()
}

fn duplicate_version(jurisdiction: &JurisdictionId, version: &SemVer) -> RegistryError {
    RegistryError::Validation(format!(
        "rulepack {jurisdiction} {version} already exists"
    ))
}

fn illegal(pack: &Rulepack, action: &str) -> RegistryError {
    RegistryError::IllegalState(format!(
        "cannot {action} rulepack {} in status {}",
        pack.id, pack.status
    ))
}

fn not_found(id: &RulepackId) -> RegistryError {
    RegistryError::NotFound(format!("rulepack {id}"))
}
