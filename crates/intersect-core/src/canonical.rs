//! Canonical encoding — the contract behind every hash in the system.
//!
//! `canonical(x)` renders any serializable value to a byte string that is
//! stable under map/object key reordering: JSON values are recursively
//! normalized into objects with lexicographically sorted keys before
//! serialization, so hashing the result is insensitive to the iteration
//! order of whatever `HashMap`/`BTreeMap` produced the input. This is the
//! single codepath `action_hash`, `policy_snapshot_hash`, and
//! `view_snapshot_hash` all build on (see `hashing.rs`).

use crate::errors::{CoreError, CoreResult};
use serde::Serialize;
use serde_json::Value;

/// Encode `value` to its canonical byte representation.
pub fn canonical<T: Serialize>(value: &T) -> CoreResult<Vec<u8>> {
    let raw = serde_json::to_value(value).map_err(|e| CoreError::EncodingFailed {
        message: e.to_string(),
    })?;
    let normalized = normalize(raw);
    serde_json::to_vec(&normalized).map_err(|e| CoreError::EncodingFailed {
        message: e.to_string(),
    })
}

/// Recursively sort object keys and normalize arrays so that two
/// semantically-equal values with differently-ordered maps serialize to
/// the same bytes.
fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> =
                map.into_iter().map(|(k, v)| (k, normalize(v))).collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut out = serde_json::Map::new();
            for (k, v) in entries {
                out.insert(k, v);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        other => other,
    }
}
