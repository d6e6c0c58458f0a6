//! # Rulepack Entity
//!
//! A rulepack is a versioned, jurisdiction-scoped bundle of opaque rule data
//! plus the regression vectors that verify it.
//!
//! ## Lifecycle
//!
//! ```text
//! install ──> Draft ──submit──> PendingApproval ──approve/activate──> Active
//!               ^                     │                               │
//!               └──────reject─────────┘        general activation     v
//!   Draft/Deprecated ──archive──> Archived     of a sibling ──> Deprecated
//! ```
//!
//! `is_active` is true only for the current general-channel pack of a
//! jurisdiction; a canary-channel pack is `Active` with `is_active = false`.

use chrono::{DateTime, Utc};
use rpk_core::{JurisdictionId, RulepackId, SemVer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::metadata::RulepackMetadata;

/// Lifecycle status of a rulepack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RulepackStatus {
    /// Installed, not yet submitted.
    Draft,
    /// Submitted for review.
    PendingApproval,
    /// Activated on the general or canary channel.
    Active,
    /// Superseded by a later general-channel activation.
    Deprecated,
    /// Retired. Terminal.
    Archived,
}

impl std::fmt::Display for RulepackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Draft => "draft",
            Self::PendingApproval => "pending_approval",
            Self::Active => "active",
            Self::Deprecated => "deprecated",
            Self::Archived => "archived",
        })
    }
}

/// Release channel named by an activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseChannel {
    /// Replaces every other active pack of the jurisdiction.
    #[default]
    General,
    /// Exposed to the tenants selected by the pack's canary plan.
    Canary,
}

impl std::fmt::Display for ReleaseChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::General => "general",
            Self::Canary => "canary",
        })
    }
}

/// One regression vector attached to a rulepack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTest {
    /// Stable identifier; generated at install when left empty.
    #[serde(default)]
    pub id: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// Input handed to the evaluator.
    pub input: Value,
    /// Output the evaluator must produce.
    pub expected_output: Value,
}

/// An installed rulepack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rulepack {
    /// Unique identifier.
    pub id: RulepackId,
    /// Jurisdiction as supplied at install (trimmed).
    pub jurisdiction: JurisdictionId,
    /// Upper-cased jurisdiction code.
    pub jurisdiction_code: String,
    /// Version, unique within the jurisdiction.
    pub version: SemVer,
    /// Lifecycle status.
    pub status: RulepackStatus,
    /// True only while this is the jurisdiction's current general-channel pack.
    pub is_active: bool,
    /// Channel named by the most recent activation.
    pub release_channel: Option<ReleaseChannel>,
    /// SHA-256 hex of the canonical rule data.
    pub checksum: String,
    /// Start of legal effect.
    pub effective_from: Option<DateTime<Utc>>,
    /// End of legal effect.
    pub effective_to: Option<DateTime<Utc>>,
    /// Opaque rule payload.
    pub rule_data: Value,
    /// Typed metadata record.
    pub metadata: RulepackMetadata,
    /// Embedded regression vectors.
    pub regression_tests: Vec<RegressionTest>,
    /// Who activated the pack.
    pub approved_by: Option<String>,
    /// When the pack was activated.
    pub approved_at: Option<DateTime<Utc>>,
    /// Installer.
    pub created_by: String,
    /// Install time.
    pub created_at: DateTime<Utc>,
}

impl Rulepack {
    /// Whether this pack is the live general-channel pack.
    pub fn is_general_active(&self) -> bool {
        self.is_active && self.status == RulepackStatus::Active
    }

    /// Whether this pack is live on the canary channel.
    pub fn is_canary_active(&self) -> bool {
        self.status == RulepackStatus::Active
            && self.release_channel == Some(ReleaseChannel::Canary)
            && !self.is_active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&RulepackStatus::PendingApproval).unwrap();
        assert_eq!(json, "\"pending_approval\"");
        assert_eq!(RulepackStatus::PendingApproval.to_string(), "pending_approval");
    }

    #[test]
    fn channel_defaults_to_general() {
        assert_eq!(ReleaseChannel::default(), ReleaseChannel::General);
    }

    #[test]
    fn regression_test_id_is_optional_on_input() {
        let t: RegressionTest =
            serde_json::from_value(serde_json::json!({"input": 1, "expected_output": 2})).unwrap();
        assert!(t.id.is_empty());
    }
}
