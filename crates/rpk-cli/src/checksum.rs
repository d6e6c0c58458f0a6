//! # Checksum Subcommand
//!
//! Prints the checksum the registry would record for a bundle's rule data,
//! in `sha256sum` layout. Key order and whitespace in the file do not
//! affect the result.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use rpk_core::checksum_of;

use crate::bundle::load_bundle;
use crate::{EXIT_INVALID, EXIT_OK};

/// Arguments for `rpk checksum`.
#[derive(Args, Debug)]
pub struct ChecksumArgs {
    /// Bundle files.
    #[arg(required = true)]
    pub bundles: Vec<PathBuf>,
}

/// Print `<hex>  <path>` per bundle.
///
/// Returns exit code: 0 on success, 1 if any bundle does not parse.
pub fn run_checksum(args: &ChecksumArgs) -> Result<u8> {
    let mut code = EXIT_OK;
    for path in &args.bundles {
        match load_bundle(path)? {
            Ok(bundle) => println!("{}  {}", checksum_of(&bundle.rule_data)?, path.display()),
            Err(reason) => {
                println!("FAIL: {}: {reason}", path.display());
                code = EXIT_INVALID;
            }
        }
    }
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{parse_bundle, BundleFormat};

    #[test]
    fn yaml_and_json_spellings_share_a_checksum() {
        let a = parse_bundle("jurisdiction: GB\nrule_data: {b: 2, a: [1, 2]}\n", BundleFormat::Yaml)
            .unwrap();
        let b = parse_bundle(
            r#"{"jurisdiction": "GB", "rule_data": {"a": [1, 2], "b": 2}}"#,
            BundleFormat::Json,
        )
        .unwrap();
        assert_eq!(
            checksum_of(&a.rule_data).unwrap(),
            checksum_of(&b.rule_data).unwrap()
        );
    }

    #[test]
    fn unparsable_bundle_is_a_validation_failure() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.yaml");
        let bad = dir.path().join("bad.json");
        std::fs::write(&good, "jurisdiction: GB\nrule_data: 1\n").unwrap();
        std::fs::write(&bad, "[").unwrap();
        assert_eq!(
            run_checksum(&ChecksumArgs { bundles: vec![good.clone()] }).unwrap(),
            EXIT_OK
        );
        assert_eq!(
            run_checksum(&ChecksumArgs { bundles: vec![good, bad] }).unwrap(),
            EXIT_INVALID
        );
    }
}
