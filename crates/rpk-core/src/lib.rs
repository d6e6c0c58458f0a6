#![deny(missing_docs)]

//! # rpk-core: Foundational Types for the Rulepack Registry
//!
//! This crate defines the types every other crate in the workspace depends
//! on. It has no internal crate dependencies: only `serde`, `serde_json`,
//! `thiserror`, `uuid`, and `sha2` from the external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** A [`RulepackId`] cannot be
//!    passed where a [`RunId`] is expected, and a [`JurisdictionId`] is never
//!    an empty string.
//!
//! 2. **[`CanonicalBytes`] is the sole path to checksum computation.** Rule
//!    payloads are canonicalized (sorted keys, compact separators) before
//!    hashing, so byte-identical rule data always yields the same checksum
//!    regardless of key order in the submitted document.
//!
//! 3. **[`SemVer`] is strictly `MAJOR.MINOR.PATCH`.** No pre-release tags,
//!    no build metadata, no leading `v`. Ordering is numeric per component.
//!
//! 4. **[`RpkError`] hierarchy.** Structured errors with `thiserror`: no
//!    `Box<dyn Error>`, no `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod identity;
pub mod jurisdiction;
pub mod version;

// Re-export primary types at crate root for ergonomic imports.
pub use canonical::CanonicalBytes;
pub use digest::{checksum_of, sha256_digest, sha256_hex, ContentDigest, DigestAlgorithm};
pub use error::{CanonicalizationError, RpkError, ValidationError};
pub use identity::{RulepackId, RunId};
pub use jurisdiction::JurisdictionId;
pub use version::{SemVer, VersionBump};
