//! # rpk-registry: Rulepack Registry & Release Pipeline
//!
//! Manages the lifecycle of versioned, jurisdiction-scoped rulepacks:
//! install with checksum and snapshot, approval workflow, regression-gated
//! activation, canary rollout, statute re-review hooks and a fleet-wide
//! health overview.
//!
//! ## Components
//!
//! - **Store & state machine** (`lifecycle`, `registry`, `store`): draft →
//!   pending_approval → active / deprecated / archived, with at most one
//!   general-channel active pack per jurisdiction at every observable instant.
//! - **Version resolver** (`version`): strict semver, numeric suggestion.
//! - **Regression runner** (`regression`, `evaluator`): detached or awaited
//!   runs against an injected [`TaxRuleEvaluator`], bounded by a timeout,
//!   cancellable, with stale-run expiry.
//! - **Canary rollout manager** (`canary`).
//! - **Statute hooks** (`statute`) and the **dashboard** (`dashboard`).
//! - **Scheduled jobs** (`jobs`): nightly sweep and periodic statute scan.
//!
//! Collaborators ([`SnapshotRepository`], [`TaxRuleEvaluator`],
//! [`StatuteMonitor`]) are injected at construction so tests can substitute
//! doubles.

pub mod canary;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod evaluator;
pub mod jobs;
pub mod lifecycle;
pub mod metadata;
pub mod registry;
pub mod regression;
pub mod rulepack;
pub mod snapshot;
pub mod statute;
pub mod store;
pub mod version;

pub use canary::{CanaryPlan, CanaryStatus, CanaryWindow};
pub use config::RegistryConfig;
pub use dashboard::{FailingRulepack, RegistryOverview};
pub use error::RegistryError;
pub use evaluator::{
    outputs_match, BlockingEvaluator, EvalFuture, EvaluationError, TaxRuleEvaluator,
    UnconfiguredEvaluator,
};
pub use jobs::{RegistryJobs, SweepReport};
pub use lifecycle::{ActivateOptions, ApproveOptions, InstallOptions, InstallRequest};
pub use metadata::{
    ApprovalRecord, ApprovalStatus, GatingStatus, MetadataPatch, NotificationPrefs,
    RegressionQuality, RulepackMetadata, StatuteDigest,
};
pub use registry::RulepackRegistry;
pub use regression::{RegressionRun, RunStatus, RunType, TestResult, TestStatus};
pub use rulepack::{RegressionTest, ReleaseChannel, Rulepack, RulepackStatus};
pub use snapshot::{
    diff_values, DiffEntry, DiffKind, InMemorySnapshotRepository, SnapshotDiff, SnapshotError,
    SnapshotReceipt, SnapshotRepository, SnapshotStatus, SnapshotSummary,
};
pub use statute::{
    FindingStatus, NoopStatuteMonitor, StatuteFinding, StatuteMonitor, StatuteScanError,
    StatuteScanReport,
};
