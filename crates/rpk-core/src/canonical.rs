//! # Canonical Serialization
//!
//! This module defines [`CanonicalBytes`], the sole construction path for
//! bytes used in checksum computation across the registry.
//!
//! ## Invariant
//!
//! The inner `Vec<u8>` is private. The only way to construct
//! `CanonicalBytes` is through [`CanonicalBytes::new()`], which rebuilds
//! every object with lexicographically sorted keys and serializes with
//! compact separators. Two rule payloads that differ only in key order or
//! whitespace therefore produce identical bytes.
//!
//! ## Rules
//!
//! 1. Sort object keys lexicographically (byte order), recursively.
//! 2. Preserve array order.
//! 3. Use compact separators (no whitespace).
//! 4. Numbers keep their serde_json textual form; non-finite floats cannot
//!    be represented in JSON and are rejected upstream by serde_json.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by key-sorted, compact JSON canonicalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Construct canonical bytes from any serializable value.
    ///
    /// This is the ONLY way to construct `CanonicalBytes`. All checksum
    /// computation in the registry must flow through this constructor.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        let mut out = Vec::new();
        write_canonical(&value, &mut out)?;
        Ok(Self(out))
    }

    /// Access the canonical bytes for digest computation.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume and return the inner byte vector.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Serialize a JSON value with sorted keys and compact separators.
///
/// Objects are re-collected into a `BTreeMap` so the output order does not
/// depend on whether serde_json was built with `preserve_order`.
fn write_canonical(value: &Value, out: &mut Vec<u8>) -> Result<(), CanonicalizationError> {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, &Value> = map.iter().collect();
            out.push(b'{');
            for (i, (key, val)) in sorted.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                out.extend(serde_json::to_vec(key)?);
                out.push(b':');
                write_canonical(val, out)?;
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out)?;
            }
            out.push(b']');
        }
        scalar => out.extend(serde_json::to_vec(scalar)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_are_sorted() {
        let cb = CanonicalBytes::new(&json!({"b": 2, "a": 1})).unwrap();
        assert_eq!(cb.as_bytes(), br#"{"a":1,"b":2}"#);
    }

    #[test]
    fn nested_objects_are_sorted() {
        let cb = CanonicalBytes::new(&json!({"z": {"y": 1, "x": [3, {"q": 0, "p": 1}]}})).unwrap();
        assert_eq!(cb.as_bytes(), br#"{"z":{"x":[3,{"p":1,"q":0}],"y":1}}"#);
    }

    #[test]
    fn array_order_is_preserved() {
        let cb = CanonicalBytes::new(&json!([3, 1, 2])).unwrap();
        assert_eq!(cb.as_bytes(), b"[3,1,2]");
    }

    #[test]
    fn floats_are_kept() {
        let cb = CanonicalBytes::new(&json!({"rate": 0.2})).unwrap();
        assert_eq!(cb.as_bytes(), br#"{"rate":0.2}"#);
    }

    #[test]
    fn strings_are_escaped() {
        let cb = CanonicalBytes::new(&json!({"k": "line\n\"quoted\""})).unwrap();
        assert_eq!(cb.as_bytes(), br#"{"k":"line\n\"quoted\""}"#);
    }

    #[test]
    fn key_order_does_not_change_bytes() {
        let a: Value = serde_json::from_str(r#"{"vat": {"standard": 20, "reduced": 5}, "name": "UK"}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"name":"UK","vat":{"reduced":5,"standard":20}}"#).unwrap();
        assert_eq!(
            CanonicalBytes::new(&a).unwrap(),
            CanonicalBytes::new(&b).unwrap()
        );
    }

    #[test]
    fn into_bytes_matches_as_bytes() {
        let cb = CanonicalBytes::new(&json!({"k": null})).unwrap();
        let copy = cb.as_bytes().to_vec();
        assert_eq!(cb.into_bytes(), copy);
    }
}
