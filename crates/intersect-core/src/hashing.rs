//! SHA-256 hashes that carry identity across the system: action hashes
//! (replay protection), policy snapshot hashes, and view snapshot hashes.

use crate::canonical::canonical;
use crate::errors::CoreResult;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// A hex-encoded SHA-256 digest.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(digest)
}

/// Canonically encode `value` and return its hex SHA-256 digest.
pub fn hash_of<T: Serialize>(value: &T) -> CoreResult<String> {
    Ok(sha256_hex(&canonical(value)?))
}

/// The tuple hashed for `ActionHash`: action id/type/parameters plus the
/// intersection/version/scopes/mode it was authorized against. Field order
/// here is irrelevant to the digest — `canonical()` sorts it — but kept
/// readable for the benefit of anyone cross-checking this against §4.A.
#[derive(Serialize)]
struct ActionHashInput<'a> {
    action_id: &'a str,
    action_type: &'a str,
    parameters: &'a serde_json::Value,
    intersection_id: &'a str,
    contract_version: &'a str,
    scopes_used: Vec<&'a str>,
    mode: &'a str,
}

/// Compute the canonical `ActionHash` for an action evaluated against one
/// specific contract version, scope set, and run mode.
///
/// Deterministic and insensitive to the iteration order of
/// `action.parameters` or `scopes_used` — both are sorted before hashing.
pub fn action_hash(
    action_id: &str,
    action_type: &str,
    parameters: &serde_json::Value,
    intersection_id: &str,
    contract_version: &str,
    scopes_used: &[String],
    mode: &str,
) -> CoreResult<String> {
    let mut scopes: Vec<&str> = scopes_used.iter().map(String::as_str).collect();
    scopes.sort_unstable();
    hash_of(&ActionHashInput {
        action_id,
        action_type,
        parameters,
        intersection_id,
        contract_version,
        scopes_used: scopes,
        mode,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn action_hash_is_deterministic() {
        let params = json!({"b": 1, "a": 2});
        let h1 = action_hash(
            "a1",
            "calendar.create_event",
            &params,
            "i1",
            "1.0.0",
            &["calendar:write".to_string()],
            "execute",
        )
        .unwrap();
        let h2 = action_hash(
            "a1",
            "calendar.create_event",
            &params,
            "i1",
            "1.0.0",
            &["calendar:write".to_string()],
            "execute",
        )
        .unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn action_hash_insensitive_to_scope_order() {
        let params = json!({});
        let h1 = action_hash(
            "a1",
            "t",
            &params,
            "i1",
            "1.0.0",
            &["calendar:write".to_string(), "email:write".to_string()],
            "execute",
        )
        .unwrap();
        let h2 = action_hash(
            "a1",
            "t",
            &params,
            "i1",
            "1.0.0",
            &["email:write".to_string(), "calendar:write".to_string()],
            "execute",
        )
        .unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn action_hash_changes_with_parameters() {
        let h1 = action_hash(
            "a1",
            "t",
            &json!({"x": 1}),
            "i1",
            "1.0.0",
            &[],
            "execute",
        )
        .unwrap();
        let h2 = action_hash(
            "a1",
            "t",
            &json!({"x": 2}),
            "i1",
            "1.0.0",
            &[],
            "execute",
        )
        .unwrap();
        assert_ne!(h1, h2);
    }
}
