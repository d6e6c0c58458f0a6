//! # Rulepack Registry
//!
//! [`RulepackRegistry`] is the explicitly constructed component that owns
//! the rulepack and regression-run stores and holds the injected
//! collaborators. It is cheap to clone; clones share state.
//!
//! Operations are grouped by concern across modules: `lifecycle` for the
//! state machine, `version` for version resolution, `regression` for the
//! runner, `canary`, `statute` and `dashboard`. This module holds
//! construction and the plain read paths.

use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use parking_lot::Mutex;
use rpk_core::{JurisdictionId, RulepackId, RunId};
use tokio::sync::watch;

use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::evaluator::TaxRuleEvaluator;
use crate::regression::RegressionRun;
use crate::rulepack::Rulepack;
use crate::snapshot::SnapshotRepository;
use crate::store::RecordStore;

/// The rulepack registry.
#[derive(Clone)]
pub struct RulepackRegistry {
    pub(crate) rulepacks: RecordStore<RulepackId, Rulepack>,
    pub(crate) runs: RecordStore<RunId, RegressionRun>,
    pub(crate) snapshots: Arc<dyn SnapshotRepository>,
    pub(crate) evaluator: Arc<dyn TaxRuleEvaluator>,
    pub(crate) config: RegistryConfig,
    pub(crate) inflight: Arc<Mutex<HashMap<RunId, watch::Sender<bool>>>>,
    pub(crate) run_sequence: Arc<AtomicU64>,
}

impl std::fmt::Debug for RulepackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RulepackRegistry")
            .field("rulepacks", &self.rulepacks.len())
            .field("runs", &self.runs.len())
            .field("config", &self.config)
            .finish()
    }
}

impl RulepackRegistry {
    /// Construct a registry over the given collaborators.
    pub fn new(
        snapshots: Arc<dyn SnapshotRepository>,
        evaluator: Arc<dyn TaxRuleEvaluator>,
        config: RegistryConfig,
    ) -> Self {
        Self {
            rulepacks: RecordStore::new(),
            runs: RecordStore::new(),
            snapshots,
            evaluator,
            config,
            inflight: Arc::new(Mutex::new(HashMap::new())),
            run_sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Registry tunables.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// The snapshot repository collaborator.
    pub fn snapshots(&self) -> &Arc<dyn SnapshotRepository> {
        &self.snapshots
    }

    /// Fetch a rulepack by id.
    pub fn get(&self, id: &RulepackId) -> Result<Rulepack, RegistryError> {
        self.rulepacks
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(format!("rulepack {id}")))
    }

    /// The current general-channel active pack of a jurisdiction, if any.
    pub fn get_active(&self, jurisdiction: &str) -> Result<Option<Rulepack>, RegistryError> {
        let jurisdiction = JurisdictionId::new(jurisdiction)?;
        Ok(self.rulepacks.read(|map| {
            map.values()
                .find(|p| p.jurisdiction == jurisdiction && p.is_general_active())
                .cloned()
        }))
    }

    /// All rulepacks, optionally for one jurisdiction, ordered by
    /// jurisdiction then version, newest version first.
    pub fn list(&self, jurisdiction: Option<&str>) -> Result<Vec<Rulepack>, RegistryError> {
        let filter = jurisdiction.map(JurisdictionId::new).transpose()?;
        let mut packs = self
            .rulepacks
            .filter(|p| filter.as_ref().map_or(true, |j| &p.jurisdiction == j));
        packs.sort_by(|a, b| {
            a.jurisdiction
                .cmp(&b.jurisdiction)
                .then_with(|| b.version.cmp(&a.version))
        });
        Ok(packs)
    }

    /// Packs of a jurisdiction whose rule data has the given checksum.
    pub fn find_by_checksum(
        &self,
        jurisdiction: &str,
        checksum: &str,
    ) -> Result<Vec<Rulepack>, RegistryError> {
        let jurisdiction = JurisdictionId::new(jurisdiction)?;
        Ok(self
            .rulepacks
            .filter(|p| p.jurisdiction == jurisdiction && p.checksum == checksum))
    }
}
