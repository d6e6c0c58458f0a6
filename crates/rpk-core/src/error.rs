//! # Error Hierarchy
//!
//! Structured error types for the foundational primitives, built with
//! `thiserror`. Registry-level errors (policy, illegal state, not found)
//! live in `rpk-registry` and wrap these.

use thiserror::Error;

/// Top-level error type for `rpk-core`.
#[derive(Error, Debug)]
pub enum RpkError {
    /// Canonicalization failure during checksum computation.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// Domain primitive validation failure.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// JSON serialization failed during canonicalization.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Validation errors for domain primitive newtypes.
///
/// Each variant carries the invalid input and the expected format so that
/// operators can diagnose a rejected request without guesswork.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Jurisdiction identifier is empty.
    #[error("invalid jurisdiction: must be non-empty")]
    InvalidJurisdictionId,

    /// Version string is not strict `MAJOR.MINOR.PATCH`.
    #[error("invalid version: \"{0}\" (expected MAJOR.MINOR.PATCH with numeric components)")]
    InvalidVersion(String),

    /// Version bump keyword is not one of major/minor/patch.
    #[error("invalid version bump: \"{0}\" (expected major, minor or patch)")]
    InvalidVersionBump(String),

    /// Bumping the version would overflow a component.
    #[error("version {version} cannot take a {bump} bump: component overflows")]
    VersionOverflow {
        /// Version being bumped.
        version: String,
        /// Requested bump.
        bump: String,
    },

    /// Identifier is not a valid UUID.
    #[error("invalid identifier: \"{0}\" (expected UUID)")]
    InvalidIdentifier(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_version_display_names_input() {
        let err = ValidationError::InvalidVersion("1.2".to_string());
        let msg = format!("{err}");
        assert!(msg.contains("1.2"));
        assert!(msg.contains("MAJOR.MINOR.PATCH"));
    }

    #[test]
    fn rpk_error_wraps_validation() {
        let err = RpkError::from(ValidationError::InvalidJurisdictionId);
        assert!(format!("{err}").contains("non-empty"));
    }

    #[test]
    fn overflow_display_names_version_and_bump() {
        let err = ValidationError::VersionOverflow {
            version: "1.2.3".into(),
            bump: "major".into(),
        };
        assert_eq!(
            err.to_string(),
            "version 1.2.3 cannot take a major bump: component overflows"
        );
    }

    #[test]
    fn invalid_bump_display() {
        let err = ValidationError::InvalidVersionBump("huge".to_string());
        assert!(format!("{err}").contains("huge"));
    }
}
