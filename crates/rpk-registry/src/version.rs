//! Version resolution per jurisdiction.

use rpk_core::{JurisdictionId, SemVer, VersionBump};

use crate::error::RegistryError;
use crate::registry::RulepackRegistry;

/// Parse `v` as a strict `MAJOR.MINOR.PATCH` version.
pub fn validate_semver(v: &str) -> Result<SemVer, RegistryError> {
    Ok(SemVer::parse(v)?)
}

/// Bump the numerically highest of `existing`, or `0.0.0` when empty.
pub fn next_version<'a>(
    existing: impl IntoIterator<Item = &'a SemVer>,
    bump: VersionBump,
) -> Result<SemVer, RegistryError> {
    Ok(existing
        .into_iter()
        .max()
        .copied()
        .unwrap_or(SemVer::ZERO)
        .bump(bump)?)
}

impl RulepackRegistry {
    /// Suggest the next version for `jurisdiction`.
    pub fn suggest_next(&self, jurisdiction: &str, bump: VersionBump) -> Result<SemVer, RegistryError> {
        let jurisdiction = JurisdictionId::new(jurisdiction)?;
        self.rulepacks.read(|map| {
            next_version(
                map.values()
                    .filter(|p| p.jurisdiction == jurisdiction)
                    .map(|p| &p.version),
                bump,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> SemVer {
        SemVer::parse(s).unwrap()
    }

    #[test]
    fn bumps_from_numeric_max() {
        let existing = vec![v("2.3.1"), v("1.9.9"), v("2.2.10")];
        assert_eq!(next_version(&existing, VersionBump::Minor).unwrap(), v("2.4.0"));
        assert_eq!(next_version(&existing, VersionBump::Major).unwrap(), v("3.0.0"));
        assert_eq!(next_version(&existing, VersionBump::Patch).unwrap(), v("2.3.2"));
    }

    #[test]
    fn numeric_not_lexicographic() {
        let existing = vec![v("9.0.0"), v("10.0.0")];
        assert_eq!(next_version(&existing, VersionBump::Patch).unwrap(), v("10.0.1"));
    }

    #[test]
    fn empty_history_starts_from_zero() {
        let none: Vec<SemVer> = vec![];
        assert_eq!(next_version(&none, VersionBump::Minor).unwrap(), v("0.1.0"));
        assert_eq!(next_version(&none, VersionBump::Major).unwrap(), v("1.0.0"));
        assert_eq!(next_version(&none, VersionBump::Patch).unwrap(), v("0.0.1"));
    }

    #[test]
    fn overflowing_suggestion_is_a_validation_error() {
        let existing = vec![v("18446744073709551615.0.0")];
        let err = next_version(&existing, VersionBump::Major).unwrap_err();
        assert_eq!(err.kind(), "VALIDATION_ERROR");
        assert_eq!(
            next_version(&existing, VersionBump::Minor).unwrap(),
            v("18446744073709551615.1.0")
        );
    }

    #[test]
    fn validate_rejects_loose_formats() {
        assert!(validate_semver("1.0.0").is_ok());
        let err = validate_semver("1.0").unwrap_err();
        assert_eq!(err.kind(), "VALIDATION_ERROR");
    }
}
