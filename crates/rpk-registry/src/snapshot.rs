//! # Snapshot Repository
//!
//! Content-addressed, append-only storage of raw rule payloads per
//! (jurisdiction, version), used for audit and diffing. The registry only
//! calls [`SnapshotRepository::persist_snapshot`] on install; diff and list
//! are read paths for operators.
//!
//! [`InMemorySnapshotRepository`] is the default implementation. Payloads
//! are stored once per checksum; a (jurisdiction, version) slot, once
//! written, can only be re-persisted with identical content.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rpk_core::{checksum_of, CanonicalizationError, JurisdictionId, SemVer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors raised by a snapshot repository.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// No snapshot for the requested slot.
    #[error("no snapshot for {jurisdiction} {version}")]
    NotFound {
        /// Jurisdiction.
        jurisdiction: String,
        /// Version.
        version: String,
    },

    /// The slot already holds different content.
    #[error("snapshot {jurisdiction} {version} already holds checksum {existing}")]
    Conflict {
        /// Jurisdiction.
        jurisdiction: String,
        /// Version.
        version: String,
        /// Checksum already stored.
        existing: String,
    },

    /// Payload could not be canonicalized.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// Storage backend failure.
    #[error("snapshot backend: {0}")]
    Backend(String),
}

/// Whether a persist call wrote new content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStatus {
    /// New slot written.
    Created,
    /// Slot already held identical content.
    Unchanged,
}

/// Result of [`SnapshotRepository::persist_snapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotReceipt {
    /// Opaque reference recorded in rulepack metadata.
    #[serde(rename = "ref")]
    pub reference: String,
    /// Created or unchanged.
    pub status: SnapshotStatus,
}

/// One stored snapshot slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    /// Jurisdiction.
    pub jurisdiction: JurisdictionId,
    /// Version.
    pub version: SemVer,
    /// Reference returned at persist time.
    #[serde(rename = "ref")]
    pub reference: String,
    /// Content checksum.
    pub checksum: String,
    /// First persist time.
    pub created_at: DateTime<Utc>,
}

/// Kind of a single structural difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    /// Present only in the newer payload.
    Added,
    /// Present only in the older payload.
    Removed,
    /// Present in both with different values.
    Changed,
}

/// A structural difference at a JSON-pointer path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffEntry {
    /// JSON pointer (RFC 6901) of the differing node; `""` is the root.
    pub path: String,
    /// Kind of difference.
    pub kind: DiffKind,
    /// Value in the older payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<Value>,
    /// Value in the newer payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<Value>,
}

/// Diff between two snapshot versions of one jurisdiction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDiff {
    /// Jurisdiction.
    pub jurisdiction: JurisdictionId,
    /// Older version.
    pub from: SemVer,
    /// Newer version.
    pub to: SemVer,
    /// Checksum of `from`.
    pub from_checksum: String,
    /// Checksum of `to`.
    pub to_checksum: String,
    /// Differences, ordered by path.
    pub entries: Vec<DiffEntry>,
}

/// Snapshot storage consumed by the registry.
pub trait SnapshotRepository: Send + Sync {
    /// Store `rule_data` for (jurisdiction, version).
    fn persist_snapshot(
        &self,
        jurisdiction: &JurisdictionId,
        version: &SemVer,
        rule_data: &Value,
    ) -> Result<SnapshotReceipt, SnapshotError>;

    /// Structural diff between two stored versions.
    fn diff_snapshots(
        &self,
        jurisdiction: &JurisdictionId,
        from: &SemVer,
        to: &SemVer,
    ) -> Result<SnapshotDiff, SnapshotError>;

    /// Stored versions of a jurisdiction, oldest version first.
    fn list_snapshots(
        &self,
        jurisdiction: &JurisdictionId,
    ) -> Result<Vec<SnapshotSummary>, SnapshotError>;
}

#[derive(Debug, Default)]
struct SnapshotTables {
    blobs: HashMap<String, Value>,
    slots: BTreeMap<(JurisdictionId, SemVer), SnapshotSummary>,
}

/// Process-local snapshot repository.
#[derive(Debug, Clone, Default)]
pub struct InMemorySnapshotRepository {
    tables: Arc<RwLock<SnapshotTables>>,
}

impl InMemorySnapshotRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct payloads stored.
    pub fn blob_count(&self) -> usize {
        self.tables.read().blobs.len()
    }

    fn payload(
        tables: &SnapshotTables,
        jurisdiction: &JurisdictionId,
        version: &SemVer,
    ) -> Result<(String, Value), SnapshotError> {
        let not_found = || SnapshotError::NotFound {
            jurisdiction: jurisdiction.to_string(),
            version: version.to_string(),
        };
        let slot = tables
            .slots
            .get(&(jurisdiction.clone(), *version))
            .ok_or_else(not_found)?;
        let blob = tables.blobs.get(&slot.checksum).ok_or_else(not_found)?;
        Ok((slot.checksum.clone(), blob.clone()))
    }
}

impl SnapshotRepository for InMemorySnapshotRepository {
    fn persist_snapshot(
        &self,
        jurisdiction: &JurisdictionId,
        version: &SemVer,
        rule_data: &Value,
    ) -> Result<SnapshotReceipt, SnapshotError> {
        let checksum = checksum_of(rule_data)?;
        let reference = format!("snapshot:{}/{}@sha256:{}", jurisdiction, version, checksum);
        let mut tables = self.tables.write();
        let key = (jurisdiction.clone(), *version);

        if let Some(existing) = tables.slots.get(&key) {
            if existing.checksum == checksum {
                return Ok(SnapshotReceipt {
                    reference: existing.reference.clone(),
                    status: SnapshotStatus::Unchanged,
                });
            }
            return Err(SnapshotError::Conflict {
                jurisdiction: jurisdiction.to_string(),
                version: version.to_string(),
                existing: existing.checksum.clone(),
            });
        }

        tables
            .blobs
            .entry(checksum.clone())
            .or_insert_with(|| rule_data.clone());
        tables.slots.insert(
            key,
            SnapshotSummary {
                jurisdiction: jurisdiction.clone(),
                version: *version,
                reference: reference.clone(),
                checksum,
                created_at: Utc::now(),
            },
        );
        tracing::debug!(jurisdiction = %jurisdiction, version = %version, "snapshot persisted");
        Ok(SnapshotReceipt {
            reference,
            status: SnapshotStatus::Created,
        })
    }

    fn diff_snapshots(
        &self,
        jurisdiction: &JurisdictionId,
        from: &SemVer,
        to: &SemVer,
    ) -> Result<SnapshotDiff, SnapshotError> {
        let tables = self.tables.read();
        let (from_checksum, before) = Self::payload(&tables, jurisdiction, from)?;
        let (to_checksum, after) = Self::payload(&tables, jurisdiction, to)?;
        Ok(SnapshotDiff {
            jurisdiction: jurisdiction.clone(),
            from: *from,
            to: *to,
            from_checksum,
            to_checksum,
            entries: diff_values(&before, &after),
        })
    }

    fn list_snapshots(
        &self,
        jurisdiction: &JurisdictionId,
    ) -> Result<Vec<SnapshotSummary>, SnapshotError> {
        Ok(self
            .tables
            .read()
            .slots
            .values()
            .filter(|s| &s.jurisdiction == jurisdiction)
            .cloned()
            .collect())
    }
}

/// Structural diff of two JSON documents.
///
/// Objects are compared key by key and recursed into; arrays and scalars
/// are compared as whole values. Entries come out in path order.
pub fn diff_values(before: &Value, after: &Value) -> Vec<DiffEntry> {
    let mut entries = Vec::new();
    diff_at(String::new(), before, after, &mut entries);
    entries
}

fn diff_at(path: String, before: &Value, after: &Value, out: &mut Vec<DiffEntry>) {
    match (before, after) {
        (Value::Object(a), Value::Object(b)) => {
            let keys: std::collections::BTreeSet<&String> = a.keys().chain(b.keys()).collect();
            for key in keys {
                let child = format!("{}/{}", path, escape_pointer(key));
                match (a.get(key), b.get(key)) {
                    (Some(x), Some(y)) => diff_at(child, x, y, out),
                    (Some(x), None) => out.push(DiffEntry {
                        path: child,
                        kind: DiffKind::Removed,
                        before: Some(x.clone()),
                        after: None,
                    }),
                    (None, Some(y)) => out.push(DiffEntry {
                        path: child,
                        kind: DiffKind::Added,
                        before: None,
                        after: Some(y.clone()),
                    }),
                    (None, None) => {}
                }
            }
        }
        (x, y) if x != y => out.push(DiffEntry {
            path,
            kind: DiffKind::Changed,
            before: Some(x.clone()),
            after: Some(y.clone()),
        }),
        _ => {}
    }
}

fn escape_pointer(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gb() -> JurisdictionId {
        JurisdictionId::new("GB").unwrap()
    }

    #[test]
    fn persist_is_idempotent_for_same_content() {
        let repo = InMemorySnapshotRepository::new();
        let v = SemVer::new(1, 0, 0);
        let first = repo.persist_snapshot(&gb(), &v, &json!({"rate": 20})).unwrap();
        let again = repo.persist_snapshot(&gb(), &v, &json!({"rate": 20})).unwrap();
        assert_eq!(first.status, SnapshotStatus::Created);
        assert_eq!(again.status, SnapshotStatus::Unchanged);
        assert_eq!(first.reference, again.reference);
    }

    #[test]
    fn persist_refuses_to_overwrite_slot() {
        let repo = InMemorySnapshotRepository::new();
        let v = SemVer::new(1, 0, 0);
        repo.persist_snapshot(&gb(), &v, &json!({"rate": 20})).unwrap();
        let err = repo.persist_snapshot(&gb(), &v, &json!({"rate": 21})).unwrap_err();
        assert!(matches!(err, SnapshotError::Conflict { .. }));
    }

    #[test]
    fn identical_content_is_stored_once() {
        let repo = InMemorySnapshotRepository::new();
        repo.persist_snapshot(&gb(), &SemVer::new(1, 0, 0), &json!({"a": 1})).unwrap();
        repo.persist_snapshot(&gb(), &SemVer::new(1, 1, 0), &json!({"a": 1})).unwrap();
        assert_eq!(repo.blob_count(), 1);
    }

    #[test]
    fn list_is_in_numeric_version_order() {
        let repo = InMemorySnapshotRepository::new();
        for v in [SemVer::new(10, 0, 0), SemVer::new(2, 0, 0), SemVer::new(2, 10, 0)] {
            repo.persist_snapshot(&gb(), &v, &json!({"v": v.to_string()})).unwrap();
        }
        repo.persist_snapshot(&JurisdictionId::new("DE").unwrap(), &SemVer::new(1, 0, 0), &json!({}))
            .unwrap();
        let versions: Vec<String> = repo
            .list_snapshots(&gb())
            .unwrap()
            .iter()
            .map(|s| s.version.to_string())
            .collect();
        assert_eq!(versions, vec!["2.0.0", "2.10.0", "10.0.0"]);
    }

    #[test]
    fn diff_reports_added_removed_changed() {
        let repo = InMemorySnapshotRepository::new();
        let a = json!({"vat": {"standard": 20, "reduced": 5}, "legacy": true});
        let b = json!({"vat": {"standard": 21, "reduced": 5, "zero": 0}});
        repo.persist_snapshot(&gb(), &SemVer::new(1, 0, 0), &a).unwrap();
        repo.persist_snapshot(&gb(), &SemVer::new(1, 1, 0), &b).unwrap();
        let diff = repo
            .diff_snapshots(&gb(), &SemVer::new(1, 0, 0), &SemVer::new(1, 1, 0))
            .unwrap();
        let summary: Vec<(&str, DiffKind)> =
            diff.entries.iter().map(|e| (e.path.as_str(), e.kind)).collect();
        assert_eq!(
            summary,
            vec![
                ("/legacy", DiffKind::Removed),
                ("/vat/standard", DiffKind::Changed),
                ("/vat/zero", DiffKind::Added),
            ]
        );
    }

    #[test]
    fn diff_of_missing_version_is_not_found() {
        let repo = InMemorySnapshotRepository::new();
        let err = repo
            .diff_snapshots(&gb(), &SemVer::new(1, 0, 0), &SemVer::new(2, 0, 0))
            .unwrap_err();
        assert!(matches!(err, SnapshotError::NotFound { .. }));
    }

    #[test]
    fn pointer_segments_are_escaped() {
        let entries = diff_values(&json!({"a/b": 1}), &json!({"a/b": 2}));
        assert_eq!(entries[0].path, "/a~1b");
    }

    #[test]
    fn scalar_root_change() {
        let entries = diff_values(&json!(1), &json!("x"));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "");
        assert_eq!(entries[0].kind, DiffKind::Changed);
    }
}
