//! Registry error taxonomy.
//!
//! Callers need to tell "fix your input" apart from "blocked by governance",
//! so policy refusals are a distinct kind from validation failures and carry
//! their own stable code.

use rpk_core::{CanonicalizationError, ValidationError};
use thiserror::Error;

use crate::snapshot::SnapshotError;

/// Errors returned by registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Malformed or missing input, bad version format, duplicate version,
    /// empty canary tenant list.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Well-formed request disallowed by governance rules (failing or absent
    /// regression, insufficient pass rate). Only an explicit override
    /// bypasses it.
    #[error("blocked by policy: {0}")]
    Policy(String),

    /// Workflow transition attempted from a disallowed status.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// Unknown rulepack, run, or jurisdiction without an active pack.
    #[error("not found: {0}")]
    NotFound(String),

    /// The final state of a regression run could not be written.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// A collaborator (snapshot repository, runtime) failed.
    #[error("collaborator failure: {0}")]
    Collaborator(String),
}

impl RegistryError {
    /// Stable machine-readable code for this error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Policy(_) => "POLICY_BLOCKED",
            Self::IllegalState(_) => "ILLEGAL_STATE",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Persistence(_) => "PERSISTENCE_ERROR",
            Self::Collaborator(_) => "COLLABORATOR_ERROR",
        }
    }
}

impl From<ValidationError> for RegistryError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<CanonicalizationError> for RegistryError {
    fn from(err: CanonicalizationError) -> Self {
        Self::Validation(format!("rule_data cannot be canonicalized: {err}"))
    }
}

impl From<SnapshotError> for RegistryError {
    fn from(err: SnapshotError) -> Self {
        match err {
            SnapshotError::NotFound { .. } => Self::NotFound(err.to_string()),
            SnapshotError::Conflict { .. } => Self::Validation(err.to_string()),
            SnapshotError::Canonicalization(_) => Self::Validation(err.to_string()),
            SnapshotError::Backend(_) => Self::Collaborator(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_distinct() {
        let kinds = [
            RegistryError::Validation(String::new()).kind(),
            RegistryError::Policy(String::new()).kind(),
            RegistryError::IllegalState(String::new()).kind(),
            RegistryError::NotFound(String::new()).kind(),
            RegistryError::Persistence(String::new()).kind(),
            RegistryError::Collaborator(String::new()).kind(),
        ];
        let unique: std::collections::HashSet<_> = kinds.iter().collect();
        assert_eq!(unique.len(), kinds.len());
    }

    #[test]
    fn core_validation_maps_to_validation() {
        let err: RegistryError = ValidationError::InvalidVersion("1.x".into()).into();
        assert_eq!(err.kind(), "VALIDATION_ERROR");
        assert!(err.to_string().contains("1.x"));
    }

    #[test]
    fn snapshot_backend_maps_to_collaborator() {
        let err: RegistryError = SnapshotError::Backend("disk full".into()).into();
        assert_eq!(err.kind(), "COLLABORATOR_ERROR");
    }
}
