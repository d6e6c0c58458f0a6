//! # Canary Rollout Manager
//!
//! A [`CanaryPlan`] is scheduled on a rulepack independently of activation
//! and only takes effect when the pack is activated on the canary channel.
//! The next general-channel activation in the jurisdiction completes it.
//!
//! ## Tenant selection
//!
//! The allow-list takes precedence: when it is non-empty only listed tenants
//! are eligible, and the percentage samples within that list. With an empty
//! list the percentage samples all tenants. Sampling is a deterministic
//! bucket: the first 8 bytes of SHA-256(`"{rulepack_id}:{tenant_id}"`),
//! big-endian, modulo 100, compared against the percentage.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rpk_core::{JurisdictionId, RulepackId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::RegistryError;
use crate::metadata::MetadataPatch;
use crate::registry::RulepackRegistry;
use crate::rulepack::{Rulepack, RulepackStatus};

/// Canary plan status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanaryStatus {
    /// Scheduled, waiting for a canary activation.
    Planned,
    /// Live.
    Active,
    /// Superseded by a general-channel activation.
    Completed,
}

/// Staged, tenant-scoped release plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanaryPlan {
    /// Allow-listed tenants.
    pub tenant_ids: BTreeSet<String>,
    /// Share of eligible tenants exposed, in `[1, 100]`.
    pub rollout_percent: u8,
    /// Plan status.
    pub status: CanaryStatus,
    /// Window start.
    pub start_at: Option<DateTime<Utc>>,
    /// Window end.
    pub end_at: Option<DateTime<Utc>>,
}

/// Optional rollout window for [`RulepackRegistry::schedule_canary`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanaryWindow {
    /// Window start.
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
    /// Window end.
    #[serde(default)]
    pub end_at: Option<DateTime<Utc>>,
}

/// Clamp a requested percentage into `[1, 100]`.
pub fn clamp_percent(requested: i64) -> u8 {
    requested.clamp(1, 100) as u8
}

impl CanaryPlan {
    /// A `Planned` plan with the percentage clamped.
    pub fn planned(
        tenant_ids: impl IntoIterator<Item = String>,
        rollout_percent: i64,
        start_at: Option<DateTime<Utc>>,
        end_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            tenant_ids: tenant_ids.into_iter().collect(),
            rollout_percent: clamp_percent(rollout_percent),
            status: CanaryStatus::Planned,
            start_at,
            end_at,
        }
    }

    /// Plan created by a canary activation with nothing scheduled.
    pub fn full_rollout(now: DateTime<Utc>) -> Self {
        Self {
            tenant_ids: BTreeSet::new(),
            rollout_percent: 100,
            status: CanaryStatus::Active,
            start_at: Some(now),
            end_at: None,
        }
    }

    /// Whether the plan is active and `now` falls inside its window.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.status == CanaryStatus::Active
            && self.start_at.map_or(true, |s| s <= now)
            && self.end_at.map_or(true, |e| now < e)
    }

    /// Whether `tenant_id` is selected for `rulepack_id`.
    pub fn includes_tenant(&self, rulepack_id: &RulepackId, tenant_id: &str) -> bool {
        if !self.tenant_ids.is_empty() && !self.tenant_ids.contains(tenant_id) {
            return false;
        }
        tenant_bucket(rulepack_id, tenant_id) < u64::from(self.rollout_percent)
    }
}

/// Deterministic `[0, 100)` bucket for a (rulepack, tenant) pair.
pub fn tenant_bucket(rulepack_id: &RulepackId, tenant_id: &str) -> u64 {
    let hash = Sha256::digest(format!("{rulepack_id}:{tenant_id}").as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&hash[..8]);
    u64::from_be_bytes(head) % 100
}

impl RulepackRegistry {
    /// Write a `Planned` canary plan onto a rulepack.
    ///
    /// May be called repeatedly before activation; each call replaces the
    /// plan. A plan that is already live cannot be rescheduled.
    pub fn schedule_canary(
        &self,
        id: &RulepackId,
        tenant_ids: Vec<String>,
        rollout_percent: i64,
        window: CanaryWindow,
    ) -> Result<CanaryPlan, RegistryError> {
        let tenants: BTreeSet<String> = tenant_ids
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if tenants.is_empty() {
            return Err(RegistryError::Validation(
                "canary rollout requires at least one tenant id".into(),
            ));
        }
        if let (Some(start), Some(end)) = (window.start_at, window.end_at) {
            if end <= start {
                return Err(RegistryError::Validation(
                    "canary window end must be after its start".into(),
                ));
            }
        }

        let plan = CanaryPlan::planned(tenants, rollout_percent, window.start_at, window.end_at);
        let result = self
            .rulepacks
            .try_update(id, |pack| {
                if pack.status == RulepackStatus::Archived {
                    return Err(RegistryError::IllegalState(format!(
                        "rulepack {id} is archived"
                    )));
                }
                if pack
                    .metadata
                    .canary
                    .as_ref()
                    .is_some_and(|p| p.status == CanaryStatus::Active)
                {
                    return Err(RegistryError::IllegalState(format!(
                        "rulepack {id} already has a live canary plan"
                    )));
                }
                pack.metadata.merge(MetadataPatch {
                    canary: Some(plan.clone()),
                    ..Default::default()
                });
                Ok(plan.clone())
            })
            .ok_or_else(|| RegistryError::NotFound(format!("rulepack {id}")))??;

        tracing::info!(
            rulepack_id = %id,
            tenants = result.tenant_ids.len(),
            rollout_percent = result.rollout_percent,
            "canary rollout scheduled"
        );
        Ok(result)
    }

    /// The rulepack that serves `tenant_id` in `jurisdiction` right now.
    ///
    /// A live canary pack that selects the tenant wins (highest version
    /// first); otherwise the general-channel active pack.
    pub fn resolve_for_tenant(
        &self,
        jurisdiction: &str,
        tenant_id: &str,
    ) -> Result<Option<Rulepack>, RegistryError> {
        let jurisdiction = JurisdictionId::new(jurisdiction)?;
        let now = Utc::now();
        let canary = self
            .rulepacks
            .filter(|p| {
                p.jurisdiction == jurisdiction
                    && p.is_canary_active()
                    && p.metadata
                        .canary
                        .as_ref()
                        .is_some_and(|plan| plan.is_live_at(now) && plan.includes_tenant(&p.id, tenant_id))
            })
            .into_iter()
            .max_by_key(|p| p.version);
        if canary.is_some() {
            return Ok(canary);
        }
        self.get_active(jurisdiction.as_str())
    }
}
