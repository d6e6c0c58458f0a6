//! # Jurisdiction Identifiers
//!
//! A jurisdiction scopes every rulepack: versions are unique per
//! jurisdiction and at most one general-channel rulepack is active per
//! jurisdiction. The identifier is trimmed at construction; no further
//! format restriction is imposed because tenants use both ISO 3166-1 codes
//! ("GB") and colloquial ones ("UK").

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A jurisdiction identifier, e.g. `"GB"`, `"UK"`, `"DE-BY"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JurisdictionId(String);

impl JurisdictionId {
    /// Create a jurisdiction identifier, validating non-emptiness.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidJurisdictionId`] if the string is
    /// empty or whitespace-only.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::InvalidJurisdictionId);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Access the jurisdiction identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The upper-cased code form stored as `jurisdiction_code`.
    pub fn code(&self) -> String {
        self.0.to_ascii_uppercase()
    }
}

impl std::fmt::Display for JurisdictionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for JurisdictionId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<JurisdictionId> for String {
    fn from(value: JurisdictionId) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jurisdiction_id_valid() {
        let jid = JurisdictionId::new("GB").unwrap();
        assert_eq!(jid.as_str(), "GB");
    }

    #[test]
    fn jurisdiction_id_is_trimmed() {
        let jid = JurisdictionId::new("  uk ").unwrap();
        assert_eq!(jid.as_str(), "uk");
        assert_eq!(jid.code(), "UK");
    }

    #[test]
    fn jurisdiction_id_rejects_empty() {
        assert!(JurisdictionId::new("").is_err());
        assert!(JurisdictionId::new("   ").is_err());
    }

    #[test]
    fn deserialize_rejects_empty() {
        let result: Result<JurisdictionId, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }
}
