//! # End-to-End Release Pipeline: GB Income Tax
//!
//! One jurisdiction, one story: an author validates a bundle offline,
//! installs it, the regression gate holds activation until a passing run,
//! a successor is approved and takes over, a canary serves a tenant
//! subset, and a statute change flags the live pack for review.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::{json, Value};

use rpk_cli::bundle::{load_bundle, parse_bundle, BundleFormat, RulepackBundle};
use rpk_cli::validate::{bundle_issues, run_validate, ValidateArgs};
use rpk_core::checksum_of;
use rpk_registry::{
    ActivateOptions, ApproveOptions, BlockingEvaluator, CanaryWindow, FindingStatus,
    GatingStatus, InMemorySnapshotRepository, InstallOptions, InstallRequest, RegistryConfig,
    RegistryError, RegistryJobs, ReleaseChannel, RulepackRegistry, RulepackStatus, RunStatus,
    RunType, StatuteFinding, StatuteMonitor,
};
use rpk_registry::statute::ScanFuture;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Banded income tax: `rate` on income above `allowance`.
fn registry() -> RulepackRegistry {
    RulepackRegistry::new(
        Arc::new(InMemorySnapshotRepository::new()),
        Arc::new(BlockingEvaluator::new(|rules: &Value, input: &Value| {
            let allowance = rules["personal_allowance"].as_f64().unwrap_or(0.0);
            let rate = rules["basic_rate"].as_f64().unwrap_or(0.0);
            let income = input["income"].as_f64().unwrap_or(0.0);
            Ok(json!({"tax": ((income - allowance).max(0.0) * rate).round()}))
        })),
        RegistryConfig::default(),
    )
}

const GB_2024: &str = "\
jurisdiction: GB
version: 1.0.0
description: 2024/25 rates
rule_data:
  personal_allowance: 12570
  basic_rate: 0.2
regression_tests:
  - id: below-allowance
    input: {income: 10000}
    expected_output: {tax: 0}
  - id: basic-rate
    input: {income: 30000}
    expected_output: {tax: 3486}
";

fn install_request(bundle: RulepackBundle) -> InstallRequest {
    InstallRequest {
        jurisdiction: bundle.jurisdiction,
        version: bundle.version,
        rule_data: bundle.rule_data,
        regression_tests: bundle.regression_tests,
        options: InstallOptions {
            description: bundle.description,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Monitor reporting a fixed set of findings.
struct FixedMonitor(Vec<StatuteFinding>);

impl StatuteMonitor for FixedMonitor {
    fn scan(&self) -> ScanFuture {
        let findings = self.0.clone();
        Box::pin(async move { Ok(findings) })
    }
}

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

#[tokio::test]
async fn gb_release_pipeline() {
    let reg = registry();

    // Act 1: the bundle file validates offline and its checksum matches the
    // registry's.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gb-2024.yaml");
    std::fs::write(&path, GB_2024).unwrap();
    let validate = ValidateArgs { bundles: vec![path.clone()], require_tests: true };
    assert_eq!(run_validate(&validate).unwrap(), 0);
    let bundle = load_bundle(&path).unwrap().unwrap();
    assert!(bundle_issues(&bundle, true).is_empty());
    let offline_checksum = checksum_of(&bundle.rule_data).unwrap();
    let v1 = reg.install(install_request(bundle), "author@hmrc").unwrap();
    let pack = reg.get(&v1).unwrap();
    assert_eq!(pack.checksum, offline_checksum);
    assert_eq!(pack.status, RulepackStatus::Draft);
    assert_eq!(pack.metadata.description.as_deref(), Some("2024/25 rates"));
    assert_eq!(reg.find_by_checksum("gb", &offline_checksum).unwrap().len(), 1);

    // Act 2: activation is gated on a passing regression run.
    let blocked = reg.activate(&v1, "lead@hmrc", ActivateOptions::default());
    assert!(matches!(blocked, Err(RegistryError::Policy(_))), "{blocked:?}");
    let run = reg.run_blocking(&v1, RunType::PreActivation, Some("ci".into())).await.unwrap();
    assert_eq!(run.status, RunStatus::Passed);
    assert_eq!((run.passed_tests, run.failed_tests), (2, 0));
    let active = reg.activate(&v1, "lead@hmrc", ActivateOptions::default()).unwrap();
    assert!(active.is_active);
    assert_eq!(active.release_channel, Some(ReleaseChannel::General));
    let quality = active.metadata.regression_quality.unwrap();
    assert_eq!(quality.gating_status, GatingStatus::Passing);

    // Act 3: a successor with an omitted version takes the next minor and
    // passes through approval.
    let mut next = install_request(parse_bundle(GB_2024, BundleFormat::Yaml).unwrap());
    next.version = None;
    next.rule_data = json!({"personal_allowance": 12570, "basic_rate": 0.21});
    next.regression_tests.truncate(1);
    let v2 = reg.install(next, "author@hmrc").unwrap();
    assert_eq!(reg.get(&v2).unwrap().version.to_string(), "1.1.0");
    reg.submit_for_approval(&v2, "author@hmrc", vec!["rates checked".into()]).unwrap();
    reg.run_blocking(&v2, RunType::PreActivation, None).await.unwrap();
    let approved = reg
        .approve(&v2, "lead@hmrc", ApproveOptions { notes: Some("lgtm".into()), ..Default::default() })
        .unwrap();
    assert!(approved.is_active);
    assert_eq!(reg.get(&v1).unwrap().status, RulepackStatus::Deprecated);
    assert_eq!(reg.get_active("GB").unwrap().unwrap().id, v2);

    // Act 4: a canary serves only its tenants; the general pack stays put.
    let mut canary = install_request(parse_bundle(GB_2024, BundleFormat::Yaml).unwrap());
    canary.version = Some("1.2.0".into());
    canary.rule_data = json!({"personal_allowance": 13000, "basic_rate": 0.2});
    canary.regression_tests.clear();
    let v3 = reg.install(canary, "author@hmrc").unwrap();
    let now = Utc::now();
    reg.schedule_canary(
        &v3,
        vec!["acme".into()],
        100,
        CanaryWindow { start_at: Some(now), end_at: Some(now + ChronoDuration::days(7)) },
    )
    .unwrap();
    reg.activate(
        &v3,
        "lead@hmrc",
        ActivateOptions {
            release_channel: ReleaseChannel::Canary,
            allow_override: true,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(reg.resolve_for_tenant("GB", "acme").unwrap().unwrap().id, v3);
    assert_eq!(reg.resolve_for_tenant("GB", "globex").unwrap().unwrap().id, v2);
    assert_eq!(reg.get_active("GB").unwrap().unwrap().id, v2);

    // Act 5: a statute change flags the live pack and starts a run.
    let jobs = RegistryJobs::new(
        reg.clone(),
        Arc::new(FixedMonitor(vec![
            StatuteFinding {
                jurisdiction: "GB".into(),
                status: FindingStatus::Updated,
                digest: Some("a1b2".into()),
                source: Some("legislation.gov.uk".into()),
                detail: None,
            },
            StatuteFinding {
                jurisdiction: "IE".into(),
                status: FindingStatus::Updated,
                digest: Some("ffff".into()),
                source: None,
                detail: None,
            },
        ])),
        2,
        std::time::Duration::from_secs(3600),
    );
    let report = jobs.run_statute_scan().await.unwrap();
    assert_eq!(report.flagged, vec![v2]);
    assert_eq!(report.skipped, vec!["IE".to_string()]);
    assert_eq!(report.runs_started.len(), 1);
    assert!(reg.get(&v2).unwrap().metadata.pending_statute_review);

    // The same digest again is not a change.
    let again = jobs.run_statute_scan().await.unwrap();
    assert!(again.flagged.is_empty());
    assert_eq!(again.unchanged, vec!["GB".to_string()]);

    let cleared = reg.clear_statute_review(&v2).unwrap();
    assert!(!cleared.metadata.pending_statute_review);

    // Act 6: the overview reflects the whole story.
    let overview = reg.overview();
    assert_eq!(overview.total_rulepacks, 3);
    // The general pack and the canary.
    assert_eq!(overview.active_rulepacks, 2);
    assert_eq!(overview.pending_statute_review, 0);
}

#[tokio::test]
async fn failing_pack_needs_an_explicit_override() {
    let reg = registry();
    let mut bundle = parse_bundle(GB_2024, BundleFormat::Yaml).unwrap();
    bundle.rule_data = json!({"personal_allowance": 0, "basic_rate": 0.2});
    let id = reg.install(install_request(bundle), "author").unwrap();

    let run = reg.run_blocking(&id, RunType::Manual, None).await.unwrap();
    assert_eq!(run.failed_tests, 2);
    assert!(matches!(
        reg.activate(&id, "lead", ActivateOptions::default()),
        Err(RegistryError::Policy(_))
    ));

    let forced = reg
        .activate(&id, "lead", ActivateOptions { allow_override: true, ..Default::default() })
        .unwrap();
    assert!(forced.is_active);
    assert_eq!(
        forced.metadata.regression_quality.unwrap().gating_status,
        GatingStatus::Blocked
    );
    let overview = reg.overview();
    assert_eq!(overview.failing.len(), 1);
}

#[tokio::test]
async fn nightly_sweep_reruns_active_packs() {
    let reg = registry();
    let id = reg
        .install(install_request(parse_bundle(GB_2024, BundleFormat::Yaml).unwrap()), "author")
        .unwrap();
    reg.activate(&id, "lead", ActivateOptions { allow_override: true, ..Default::default() })
        .unwrap();

    let jobs = RegistryJobs::new(
        reg.clone(),
        Arc::new(FixedMonitor(Vec::new())),
        2,
        std::time::Duration::from_secs(3600),
    );
    let report = jobs.run_regression_sweep(Utc::now());
    assert_eq!(report.started.len(), 1);
    assert_eq!(report.failed, 0);

    let run_id = report.started[0];
    for _ in 0..200 {
        if reg.get_run(&run_id).unwrap().status != RunStatus::Running {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    let run = reg.get_run(&run_id).unwrap();
    assert_eq!(run.status, RunStatus::Passed);
    assert_eq!(run.run_type, RunType::Scheduled);
}
