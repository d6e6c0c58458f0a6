//! # Validate Subcommand
//!
//! Runs the checks a registry install would make against bundle files, so
//! authors catch problems before submitting them.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use rpk_core::{checksum_of, JurisdictionId, SemVer};

use crate::bundle::{load_bundle, RulepackBundle};
use crate::{EXIT_INVALID, EXIT_OK};

/// Arguments for `rpk validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Bundle files to validate.
    #[arg(required = true)]
    pub bundles: Vec<PathBuf>,

    /// Treat a bundle without regression tests as invalid.
    #[arg(long)]
    pub require_tests: bool,
}

/// Problems that would make an install fail, in file order.
pub fn bundle_issues(bundle: &RulepackBundle, require_tests: bool) -> Vec<String> {
    let mut issues = Vec::new();
    if let Err(e) = JurisdictionId::new(bundle.jurisdiction.as_str()) {
        issues.push(e.to_string());
    }
    if let Some(version) = &bundle.version {
        if let Err(e) = SemVer::parse(version.trim()) {
            issues.push(e.to_string());
        }
    }
    if bundle.rule_data.is_null() {
        issues.push("rule_data is required".to_string());
    }
    if require_tests && bundle.regression_tests.is_empty() {
        issues.push("no regression tests".to_string());
    }
    let mut seen = HashSet::new();
    for (index, test) in bundle.regression_tests.iter().enumerate() {
        let id = test.id.trim();
        if !id.is_empty() && !seen.insert(id) {
            issues.push(format!("duplicate regression test id {id}"));
        }
        if test.expected_output.is_null() {
            issues.push(format!("regression test #{index} has no expected_output"));
        }
    }
    issues
}

/// Validate each bundle and print a per-file verdict.
///
/// Returns exit code: 0 when every bundle is valid, 1 when any fails,
/// 2 (via `Err`) on I/O errors.
pub fn run_validate(args: &ValidateArgs) -> Result<u8> {
    let mut failed = 0usize;
    for path in &args.bundles {
        let bundle = match load_bundle(path)? {
            Ok(bundle) => bundle,
            Err(reason) => {
                println!("FAIL: {}: {reason}", path.display());
                failed += 1;
                continue;
            }
        };
        let issues = bundle_issues(&bundle, args.require_tests);
        if issues.is_empty() {
            let checksum = checksum_of(&bundle.rule_data)?;
            println!(
                "OK: {} ({} {}, {} regression tests, checksum {checksum})",
                path.display(),
                bundle.jurisdiction.trim(),
                bundle.version.as_deref().unwrap_or("unversioned"),
                bundle.regression_tests.len(),
            );
        } else {
            println!("FAIL: {}", path.display());
            for issue in &issues {
                println!("  - {issue}");
            }
            failed += 1;
        }
    }
    tracing::info!(total = args.bundles.len(), failed, "validation complete");
    Ok(if failed == 0 { EXIT_OK } else { EXIT_INVALID })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{parse_bundle, BundleFormat};
    use std::io::Write;

    fn yaml(text: &str) -> RulepackBundle {
        parse_bundle(text, BundleFormat::Yaml).unwrap()
    }

    fn write(dir: &tempfile::TempDir, name: &str, text: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(text.as_bytes()).unwrap();
        path
    }

    #[test]
    fn well_formed_bundle_has_no_issues() {
        let bundle = yaml("jurisdiction: GB\nversion: 1.0.0\nrule_data: {rate: 0.2}\n");
        assert!(bundle_issues(&bundle, false).is_empty());
    }

    #[test]
    fn reports_every_problem() {
        let bundle = yaml(
            "jurisdiction: '  '\nversion: '1.2'\nregression_tests:\n  - {id: a, input: {}, expected_output: 1}\n  - {id: a, input: {}, expected_output: null}\n",
        );
        let issues = bundle_issues(&bundle, false);
        assert_eq!(issues.len(), 5, "{issues:?}");
        assert!(issues.iter().any(|i| i == "rule_data is required"));
        assert!(issues.iter().any(|i| i == "duplicate regression test id a"));
        assert!(issues.iter().any(|i| i.contains("#1 has no expected_output")));
    }

    #[test]
    fn blank_test_ids_are_not_duplicates() {
        let bundle = yaml(
            "jurisdiction: GB\nrule_data: 1\nregression_tests:\n  - {input: 1, expected_output: 1}\n  - {input: 2, expected_output: 2}\n",
        );
        assert!(bundle_issues(&bundle, true).is_empty());
    }

    #[test]
    fn require_tests_flags_empty_bundles() {
        let bundle = yaml("jurisdiction: GB\nrule_data: 1\n");
        assert_eq!(bundle_issues(&bundle, true), vec!["no regression tests"]);
    }

    #[test]
    fn exit_code_reflects_worst_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let good = write(&dir, "good.yaml", "jurisdiction: GB\nrule_data: {rate: 0.2}\n");
        let bad = write(&dir, "bad.json", "{\"jurisdiction\": \"GB\"}");
        let broken = write(&dir, "broken.json", "{");

        let ok = ValidateArgs { bundles: vec![good.clone()], require_tests: false };
        assert_eq!(run_validate(&ok).unwrap(), EXIT_OK);

        let mixed = ValidateArgs { bundles: vec![good.clone(), bad], require_tests: false };
        assert_eq!(run_validate(&mixed).unwrap(), EXIT_INVALID);

        let unparsable = ValidateArgs { bundles: vec![broken], require_tests: false };
        assert_eq!(run_validate(&unparsable).unwrap(), EXIT_INVALID);

        let missing = ValidateArgs {
            bundles: vec![good, dir.path().join("missing.yaml")],
            require_tests: false,
        };
        assert!(run_validate(&missing).is_err());
    }
}
