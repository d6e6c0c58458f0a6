//! # Diff Subcommand
//!
//! Structural diff of two bundles' rule data, reported as JSON-pointer
//! paths.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use rpk_registry::{diff_values, DiffEntry, DiffKind};
use serde_json::Value;

use crate::bundle::load_bundle;
use crate::{EXIT_INVALID, EXIT_OK};

/// Arguments for `rpk diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Older bundle.
    pub old: PathBuf,

    /// Newer bundle.
    pub new: PathBuf,

    /// Print the entries as a JSON array.
    #[arg(long)]
    pub json: bool,
}

/// One output line for `entry`.
pub fn render_entry(entry: &DiffEntry) -> String {
    let path = if entry.path.is_empty() { "/" } else { entry.path.as_str() };
    let show = |v: &Option<Value>| v.as_ref().map(Value::to_string).unwrap_or_default();
    match entry.kind {
        DiffKind::Added => format!("+ {path}: {}", show(&entry.after)),
        DiffKind::Removed => format!("- {path}: {}", show(&entry.before)),
        DiffKind::Changed => format!(
            "~ {path}: {} -> {}",
            show(&entry.before),
            show(&entry.after)
        ),
    }
}

/// Print the differences between two bundles.
///
/// Returns exit code: 0 on success (identical or not), 1 if either bundle
/// does not parse.
pub fn run_diff(args: &DiffArgs) -> Result<u8> {
    let mut loaded = Vec::with_capacity(2);
    for path in [&args.old, &args.new] {
        match load_bundle(path)? {
            Ok(bundle) => loaded.push(bundle.rule_data),
            Err(reason) => {
                println!("FAIL: {}: {reason}", path.display());
                return Ok(EXIT_INVALID);
            }
        }
    }
    let entries = diff_values(&loaded[0], &loaded[1]);
    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&entries).context("failed to encode diff")?
        );
    } else if entries.is_empty() {
        println!("no differences");
    } else {
        for entry in &entries {
            println!("{}", render_entry(entry));
        }
    }
    tracing::debug!(entries = entries.len(), "diff complete");
    Ok(EXIT_OK)
}
