//! Bundle loading.
//!
//! Reading a file is operational (errors propagate as `anyhow`); parsing it
//! is validation (errors come back as a message the caller reports).

use std::path::Path;

use anyhow::{Context, Result};
use rpk_registry::RegressionTest;
use serde::Deserialize;
use serde_json::Value;

/// A rulepack as authored on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct RulepackBundle {
    /// Jurisdiction code.
    pub jurisdiction: String,
    /// `MAJOR.MINOR.PATCH`, optional.
    #[serde(default)]
    pub version: Option<String>,
    /// Opaque rule payload.
    #[serde(default)]
    pub rule_data: Value,
    /// Regression vectors.
    #[serde(default)]
    pub regression_tests: Vec<RegressionTest>,
    /// Free-text description.
    #[serde(default)]
    pub description: Option<String>,
}

/// Bundle file syntax, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleFormat {
    /// `.json`
    Json,
    /// Anything else is read as YAML.
    Yaml,
}

impl BundleFormat {
    /// Format implied by `path`'s extension.
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

/// Parse bundle text.
pub fn parse_bundle(text: &str, format: BundleFormat) -> Result<RulepackBundle, String> {
    match format {
        BundleFormat::Json => serde_json::from_str(text).map_err(|e| format!("invalid JSON: {e}")),
        BundleFormat::Yaml => serde_yaml::from_str(text).map_err(|e| format!("invalid YAML: {e}")),
    }
}

/// Read a bundle file. The outer `Result` is I/O; the inner one is parsing.
pub fn load_bundle(path: &Path) -> Result<Result<RulepackBundle, String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read bundle {}", path.display()))?;
    Ok(parse_bundle(&text, BundleFormat::for_path(path)))
}
