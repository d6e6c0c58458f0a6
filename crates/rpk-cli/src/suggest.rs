//! # Suggest Subcommand
//!
//! Computes the next version from a list of existing ones, with the same
//! rule the registry applies when an install omits the version.

use anyhow::Result;
use clap::Args;
use rpk_core::{SemVer, VersionBump};
use rpk_registry::version::next_version;

use crate::{EXIT_INVALID, EXIT_OK};

/// Arguments for `rpk suggest`.
#[derive(Args, Debug)]
pub struct SuggestArgs {
    /// Existing versions; repeatable. None means the jurisdiction is empty.
    #[arg(long = "current", value_name = "VERSION")]
    pub current: Vec<String>,

    /// `major`, `minor` or `patch`.
    #[arg(long, default_value = "minor")]
    pub bump: String,
}

/// Compute the suggestion, or the first input that is not a valid version.
pub fn suggest(args: &SuggestArgs) -> Result<SemVer, String> {
    let bump: VersionBump = args.bump.parse().map_err(|e| format!("{e}"))?;
    let existing = args
        .current
        .iter()
        .map(|v| SemVer::parse(v.trim()).map_err(|e| e.to_string()))
        .collect::<Result<Vec<_>, _>>()?;
    next_version(&existing, bump).map_err(|e| e.to_string())
}

/// Print the suggested version.
///
/// Returns exit code: 0 on success, 1 on an invalid version or bump.
pub fn run_suggest(args: &SuggestArgs) -> Result<u8> {
    match suggest(args) {
        Ok(version) => {
            println!("{version}");
            Ok(EXIT_OK)
        }
        Err(reason) => {
            println!("FAIL: {reason}");
            Ok(EXIT_INVALID)
        }
    }
}
