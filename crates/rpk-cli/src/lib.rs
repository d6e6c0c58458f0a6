//! # rpk-cli: Operator CLI for Rulepack Bundles
//!
//! Works on bundle files offline, before anything reaches the registry.
//!
//! ## Subcommands
//!
//! - `rpk validate <bundle>...`: structural checks a registry install would make.
//! - `rpk checksum <bundle>...`: SHA-256 of the canonical rule data.
//! - `rpk suggest --current <v>... --bump <kind>`: next version.
//! - `rpk diff <old> <new>`: structural diff of two bundles' rule data.
//!
//! ## Exit codes
//!
//! `0` success, `1` validation failure, `2` operational error (unreadable
//! file, I/O).
//!
//! ## Bundle format
//!
//! YAML (`.yaml`/`.yml`) or JSON:
//!
//! ```yaml
//! jurisdiction: GB
//! version: 1.4.0
//! rule_data:
//!   personal_allowance: 12570
//! regression_tests:
//!   - name: basic-rate
//!     input: { income: 30000 }
//!     expected_output: { tax: 3486 }
//! ```

pub mod bundle;
pub mod checksum;
pub mod diff;
pub mod suggest;
pub mod validate;

/// Exit code for a successful command.
pub const EXIT_OK: u8 = 0;
/// Exit code when input fails validation.
pub const EXIT_INVALID: u8 = 1;
