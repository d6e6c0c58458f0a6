//! # Semantic Versions
//!
//! Rulepack versions are strict `MAJOR.MINOR.PATCH` triples: three
//! dot-separated runs of ASCII digits, nothing else. Ordering compares the
//! components numerically, so `10.0.0 > 2.0.0`.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A strict `MAJOR.MINOR.PATCH` version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SemVer {
    /// Major component.
    pub major: u64,
    /// Minor component.
    pub minor: u64,
    /// Patch component.
    pub patch: u64,
}

impl SemVer {
    /// `0.0.0`, the base a jurisdiction's first suggestion bumps from.
    pub const ZERO: SemVer = SemVer::new(0, 0, 0);

    /// Construct a version from its components.
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a strict `MAJOR.MINOR.PATCH` string.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidVersion`] for anything other than
    /// exactly three non-empty digit runs that each fit in a `u64`.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidVersion(s.to_string());
        let mut parts = s.split('.');
        let mut next = || -> Result<u64, ValidationError> {
            let part = parts.next().ok_or_else(invalid)?;
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            part.parse::<u64>().map_err(|_| invalid())
        };
        let major = next()?;
        let minor = next()?;
        let patch = next()?;
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self::new(major, minor, patch))
    }

    /// Apply a bump: major resets minor and patch, minor resets patch.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::VersionOverflow`] when the bumped
    /// component is already `u64::MAX`.
    pub fn bump(&self, bump: VersionBump) -> Result<Self, ValidationError> {
        let overflow = || ValidationError::VersionOverflow {
            version: self.to_string(),
            bump: bump.to_string(),
        };
        let next = match bump {
            VersionBump::Major => Self::new(self.major.checked_add(1).ok_or_else(overflow)?, 0, 0),
            VersionBump::Minor => {
                Self::new(self.major, self.minor.checked_add(1).ok_or_else(overflow)?, 0)
            }
            VersionBump::Patch => Self::new(
                self.major,
                self.minor,
                self.patch.checked_add(1).ok_or_else(overflow)?,
            ),
        };
        Ok(next)
    }
}

impl std::fmt::Display for SemVer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for SemVer {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SemVer {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SemVer> for String {
    fn from(value: SemVer) -> Self {
        value.to_string()
    }
}

/// Which component of a version to increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionBump {
    /// Breaking change: `(M+1).0.0`.
    Major,
    /// Additive change: `M.(m+1).0`.
    #[default]
    Minor,
    /// Correction: `M.m.(p+1)`.
    Patch,
}

impl std::fmt::Display for VersionBump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Patch => "patch",
        })
    }
}

impl FromStr for VersionBump {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "major" => Ok(Self::Major),
            "minor" => Ok(Self::Minor),
            "patch" => Ok(Self::Patch),
            _ => Err(ValidationError::InvalidVersionBump(s.to_string())),
        }
    }
}
