//! # Regression Test Runner
//!
//! Executes a rulepack's regression vectors against the
//! [`TaxRuleEvaluator`](crate::evaluator::TaxRuleEvaluator) and records the
//! verdict as a [`RegressionRun`].
//!
//! - [`RulepackRegistry::run`] records a `running` run, spawns execution as
//!   a detached task and returns the run id. Callers poll
//!   [`RulepackRegistry::get_run`].
//! - [`RulepackRegistry::run_blocking`] awaits the same execution.
//!
//! Every vector is attempted. An evaluator error, a timeout or a mismatch is
//! that vector's failure and never aborts the run. The terminal state is
//! written exactly once: whichever of completion, cancellation or stale-run
//! expiry gets there first wins, later writers are discarded. Only a failure
//! to write that terminal state surfaces as an error.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rpk_core::{RulepackId, RunId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;

use crate::error::RegistryError;
use crate::evaluator::outputs_match;
use crate::metadata::{GatingStatus, MetadataPatch, RegressionQuality};
use crate::registry::RulepackRegistry;
use crate::rulepack::RegressionTest;

/// Why a run was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunType {
    /// Gate check before activation.
    PreActivation,
    /// Nightly sweep or statute-triggered.
    Scheduled,
    /// Requested by an operator.
    Manual,
}

/// Run status. Terminal values are a pure function of the counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Executing.
    Running,
    /// No vector failed.
    Passed,
    /// No vector passed.
    Failed,
    /// Some passed, some failed.
    Partial,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Running => "running",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Partial => "partial",
        })
    }
}

/// Status derived from the counts of a completed run.
///
/// `passed` iff nothing failed (vacuously for an empty run), `failed` iff
/// nothing passed out of a non-empty run, `partial` otherwise.
pub fn status_for(total: usize, passed: usize, failed: usize) -> RunStatus {
    if failed == 0 {
        RunStatus::Passed
    } else if passed == 0 && total > 0 {
        RunStatus::Failed
    } else {
        RunStatus::Partial
    }
}

/// `passed / total`, or `1.0` for an empty run.
pub fn pass_rate(total: usize, passed: usize) -> f64 {
    if total == 0 {
        1.0
    } else {
        passed as f64 / total as f64
    }
}

/// Outcome of one vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    /// Output matched.
    Passed,
    /// Mismatch, evaluator error, timeout, or not attempted.
    Failed,
}

/// Result of one vector within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    /// Vector id.
    pub test_id: String,
    /// Outcome.
    pub status: TestStatus,
    /// Failure reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall time spent evaluating.
    pub duration_ms: u64,
}

impl TestResult {
    fn not_attempted(test: &RegressionTest, reason: &str) -> Self {
        Self {
            test_id: test.id.clone(),
            status: TestStatus::Failed,
            error: Some(reason.to_string()),
            duration_ms: 0,
        }
    }
}

/// One execution of all vectors of a rulepack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionRun {
    /// Run id.
    pub id: RunId,
    /// Owning rulepack.
    pub rulepack_id: RulepackId,
    /// Trigger.
    pub run_type: RunType,
    /// Status.
    pub status: RunStatus,
    /// Number of vectors.
    pub total_tests: usize,
    /// Vectors that passed.
    pub passed_tests: usize,
    /// Vectors that failed.
    pub failed_tests: usize,
    /// Per-vector results, in vector order.
    pub test_results: Vec<TestResult>,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// Completion time.
    pub completed_at: Option<DateTime<Utc>>,
    /// Run-level note (cancellation, expiry).
    pub error_message: Option<String>,
    /// Requester.
    pub executed_by: Option<String>,
    /// Registry-wide start order; the highest is a rulepack's latest run.
    pub sequence: u64,
}

impl RegressionRun {
    /// Pass rate of this run.
    pub fn pass_rate(&self) -> f64 {
        pass_rate(self.total_tests, self.passed_tests)
    }

    /// Whether the run has reached a terminal status.
    pub fn is_complete(&self) -> bool {
        self.status != RunStatus::Running
    }
}

struct PreparedRun {
    run_id: RunId,
    rulepack_id: RulepackId,
    rule_data: Arc<Value>,
    tests: Vec<RegressionTest>,
    cancel: watch::Receiver<bool>,
}

const CANCELLED: &str = "cancelled";
const EXPIRED: &str = "expired";
const EXPIRED_MESSAGE: &str = "expired: no completion recorded";

impl RulepackRegistry {
    /// Start a run as a detached task and return its id immediately.
    pub fn run(
        &self,
        rulepack_id: &RulepackId,
        run_type: RunType,
        executed_by: Option<String>,
    ) -> Result<RunId, RegistryError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| {
            RegistryError::Collaborator("no async runtime available for a detached run".into())
        })?;
        let prepared = self.start_run(rulepack_id, run_type, executed_by)?;
        let run_id = prepared.run_id;
        let registry = self.clone();
        handle.spawn(async move {
            if let Err(err) = registry.execute(prepared).await {
                tracing::error!(run_id = %run_id, error = %err, "regression run could not be finalised");
            }
        });
        Ok(run_id)
    }

    /// Run all vectors and return the completed run.
    pub async fn run_blocking(
        &self,
        rulepack_id: &RulepackId,
        run_type: RunType,
        executed_by: Option<String>,
    ) -> Result<RegressionRun, RegistryError> {
        let prepared = self.start_run(rulepack_id, run_type, executed_by)?;
        self.execute(prepared).await
    }

    /// Ask an in-flight run to stop.
    ///
    /// Vectors not yet attempted are recorded as failed with error
    /// `"cancelled"`. A run that is not known to this process is finalised
    /// directly the same way.
    pub fn cancel(&self, run_id: &RunId) -> Result<(), RegistryError> {
        let run = self.get_run(run_id)?;
        if run.is_complete() {
            return Err(RegistryError::IllegalState(format!(
                "regression run {run_id} already completed with status {}",
                run.status
            )));
        }
        let signalled = match self.inflight.lock().get(run_id) {
            Some(tx) => {
                tx.send_replace(true);
                true
            }
            None => false,
        };
        tracing::info!(run_id = %run_id, rulepack_id = %run.rulepack_id, "regression run cancellation requested");
        if !signalled {
            self.finalise_unattended(&run, CANCELLED, CANCELLED)?;
        }
        Ok(())
    }

    /// Expire every `running` run started before `now - stale_run_after`.
    ///
    /// Returns the ids of the runs this call finalised.
    pub fn expire_stale_runs(&self, now: DateTime<Utc>) -> Vec<RunId> {
        let threshold = chrono::Duration::from_std(self.config.stale_run_after)
            .unwrap_or_else(|_| chrono::Duration::hours(1));
        let cutoff = now - threshold;
        let stale = self
            .runs
            .filter(|r| r.status == RunStatus::Running && r.started_at < cutoff);

        let mut expired = Vec::new();
        for run in stale {
            let outcome = self.finalise_unattended(&run, EXPIRED, EXPIRED_MESSAGE);
            if let Some(tx) = self.inflight.lock().remove(&run.id) {
                tx.send_replace(true);
            }
            match outcome {
                Ok(true) => {
                    tracing::warn!(run_id = %run.id, rulepack_id = %run.rulepack_id, started_at = %run.started_at, "stale regression run expired");
                    expired.push(run.id);
                }
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(run_id = %run.id, error = %err, "stale run could not be expired, skipping");
                }
            }
        }
        expired
    }

    /// Fetch a run by id.
    pub fn get_run(&self, run_id: &RunId) -> Result<RegressionRun, RegistryError> {
        self.runs
            .get(run_id)
            .ok_or_else(|| RegistryError::NotFound(format!("regression run {run_id}")))
    }

    /// The most recently started run of a rulepack.
    pub fn latest_run(&self, rulepack_id: &RulepackId) -> Option<RegressionRun> {
        self.runs
            .filter(|r| &r.rulepack_id == rulepack_id)
            .into_iter()
            .max_by_key(|r| r.sequence)
    }

    /// All runs of a rulepack, newest first.
    pub fn runs_for(&self, rulepack_id: &RulepackId) -> Vec<RegressionRun> {
        let mut runs = self.runs.filter(|r| &r.rulepack_id == rulepack_id);
        runs.sort_by(|a, b| b.sequence.cmp(&a.sequence));
        runs
    }

    /// Quality summary for `run` under the configured threshold.
    pub fn quality_of(&self, run: &RegressionRun) -> RegressionQuality {
        let gating_status = match run.status {
            RunStatus::Running => GatingStatus::Pending,
            RunStatus::Passed if run.pass_rate() >= self.config.min_pass_rate => {
                GatingStatus::Passing
            }
            _ => GatingStatus::Blocked,
        };
        RegressionQuality {
            last_run_id: run.id,
            pass_rate: run.pass_rate(),
            coverage: run.total_tests,
            gating_status,
            last_run_at: run.completed_at.unwrap_or(run.started_at),
        }
    }

    /// Copy the latest run's summary into the rulepack's metadata.
    pub(crate) fn refresh_quality(&self, rulepack_id: &RulepackId) {
        let Some(run) = self.latest_run(rulepack_id) else {
            return;
        };
        let quality = self.quality_of(&run);
        let updated = self.rulepacks.update(rulepack_id, |pack| {
            pack.metadata.merge(MetadataPatch {
                regression_quality: Some(quality),
                ..Default::default()
            });
        });
        if updated.is_none() {
            tracing::warn!(rulepack_id = %rulepack_id, "rulepack vanished before quality refresh");
        }
    }

    fn start_run(
        &self,
        rulepack_id: &RulepackId,
        run_type: RunType,
        executed_by: Option<String>,
    ) -> Result<PreparedRun, RegistryError> {
        let pack = self.get(rulepack_id)?;
        let run_id = RunId::new();
        let run = RegressionRun {
            id: run_id,
            rulepack_id: *rulepack_id,
            run_type,
            status: RunStatus::Running,
            total_tests: pack.regression_tests.len(),
            passed_tests: 0,
            failed_tests: 0,
            test_results: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
            error_message: None,
            executed_by,
            sequence: self.run_sequence.fetch_add(1, Ordering::SeqCst),
        };
        let (tx, rx) = watch::channel(false);
        self.inflight.lock().insert(run_id, tx);
        self.runs.insert(run_id, run);
        self.refresh_quality(rulepack_id);

        tracing::info!(
            run_id = %run_id,
            rulepack_id = %rulepack_id,
            jurisdiction = %pack.jurisdiction,
            version = %pack.version,
            tests = pack.regression_tests.len(),
            "regression run started"
        );
        Ok(PreparedRun {
            run_id,
            rulepack_id: *rulepack_id,
            rule_data: Arc::new(pack.rule_data),
            tests: pack.regression_tests,
            cancel: rx,
        })
    }

    async fn execute(&self, prepared: PreparedRun) -> Result<RegressionRun, RegistryError> {
        let PreparedRun {
            run_id,
            rulepack_id,
            rule_data,
            tests,
            mut cancel,
        } = prepared;

        let mut results = Vec::with_capacity(tests.len());
        let mut cancelled = false;
        for test in &tests {
            if !cancelled {
                tokio::select! {
                    result = self.evaluate_vector(&rule_data, test) => results.push(result),
                    _ = cancellation(&mut cancel) => cancelled = true,
                }
            }
            if cancelled {
                results.push(TestResult::not_attempted(test, CANCELLED));
            }
        }
        self.inflight.lock().remove(&run_id);

        let note = cancelled.then(|| CANCELLED.to_string());
        let (_, run) = self.finalise(&run_id, &rulepack_id, results, note)?;
        Ok(run)
    }

    async fn evaluate_vector(&self, rule_data: &Arc<Value>, test: &RegressionTest) -> TestResult {
        let timeout = self.config.evaluator_timeout;
        let started = Instant::now();
        let outcome = tokio::time::timeout(
            timeout,
            self.evaluator
                .evaluate(Arc::clone(rule_data), test.input.clone()),
        )
        .await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let error = match outcome {
            Err(_) => Some(format!("evaluator timed out after {timeout:?}")),
            Ok(Err(err)) => Some(err.to_string()),
            Ok(Ok(actual)) if outputs_match(&actual, &test.expected_output) => None,
            Ok(Ok(actual)) => Some(format!(
                "output mismatch: expected {}, got {}",
                test.expected_output, actual
            )),
        };
        if let Some(reason) = &error {
            tracing::debug!(test_id = %test.id, error = %reason, "regression vector failed");
        }
        TestResult {
            test_id: test.id.clone(),
            status: if error.is_none() {
                TestStatus::Passed
            } else {
                TestStatus::Failed
            },
            error,
            duration_ms,
        }
    }

    /// Finalise a run nobody is executing: every vector fails with `reason`.
    fn finalise_unattended(
        &self,
        run: &RegressionRun,
        reason: &str,
        note: &str,
    ) -> Result<bool, RegistryError> {
        let results = match self.rulepacks.get(&run.rulepack_id) {
            Some(pack) => pack
                .regression_tests
                .iter()
                .map(|t| TestResult::not_attempted(t, reason))
                .collect(),
            None => Vec::new(),
        };
        let (written, _) = self.finalise(&run.id, &run.rulepack_id, results, Some(note.to_string()))?;
        Ok(written)
    }

    /// Write the terminal state once. Returns whether this call wrote it.
    fn finalise(
        &self,
        run_id: &RunId,
        rulepack_id: &RulepackId,
        results: Vec<TestResult>,
        note: Option<String>,
    ) -> Result<(bool, RegressionRun), RegistryError> {
        let total = results.len();
        let passed = results
            .iter()
            .filter(|r| r.status == TestStatus::Passed)
            .count();
        let failed = total - passed;
        let status = status_for(total, passed, failed);
        let now = Utc::now();

        let outcome = self.runs.transact(|map| {
            let run = map.get_mut(run_id)?;
            if run.is_complete() {
                return Some((false, run.clone()));
            }
            run.total_tests = total;
            run.passed_tests = passed;
            run.failed_tests = failed;
            run.test_results = results;
            run.status = status;
            run.completed_at = Some(now);
            run.error_message = note;
            Some((true, run.clone()))
        });

        let Some((written, run)) = outcome else {
            tracing::error!(run_id = %run_id, rulepack_id = %rulepack_id, "regression run record missing at finalisation");
            return Err(RegistryError::Persistence(format!(
                "regression run {run_id} could not be finalised: record missing"
            )));
        };
        if !written {
            tracing::debug!(run_id = %run_id, status = %run.status, "run already finalised, late result discarded");
            return Ok((false, run));
        }

        tracing::info!(
            run_id = %run_id,
            rulepack_id = %rulepack_id,
            status = %status,
            passed = passed,
            failed = failed,
            "regression run completed"
        );
        self.refresh_quality(rulepack_id);
        Ok((true, run))
    }
}

/// Resolves once the cancel flag is raised. Never resolves if the sender is gone.
async fn cancellation(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
