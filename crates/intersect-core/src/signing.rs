//! Signing and verification interface for approval request tokens and
//! approval artifacts.
//!
//! `spec.md` §9 flags this as abstract by design: "any MAC/signature
//! scheme satisfying deterministic, verifiable, keyed suffices". The
//! workspace ships an HMAC-SHA256 implementation behind the `Signer`
//! trait — swapping in a real key-management-backed signer (e.g. Ed25519
//! over a KMS-held key) means implementing the trait, not touching a
//! caller.

use crate::canonical::canonical;
use crate::errors::{CoreError, CoreResult};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// A keyed signer over canonically-encoded payloads.
pub trait Signer: Send + Sync {
    fn sign(&self, payload: &[u8]) -> Vec<u8>;
    fn verify(&self, payload: &[u8], signature: &[u8]) -> bool;
}

/// Process-wide HMAC-SHA256 signer.
///
/// `spec.md` §9 notes the source uses "a single process-wide HMAC with a
/// default demo secret" — this is that scheme, made explicit and
/// constructed with a caller-supplied key rather than a hardcoded
/// default. Production deployments substitute a `Signer` backed by a real
/// key-management path.
pub struct HmacSigner {
    key: Vec<u8>,
}

impl HmacSigner {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }
}

impl Signer for HmacSigner {
    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC accepts any key length");
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }

    fn verify(&self, payload: &[u8], signature: &[u8]) -> bool {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC accepts any key length");
        mac.update(payload);
        mac.verify_slice(signature).is_ok()
    }
}

/// Sign a canonically-encoded value with `signer`, returning the raw
/// signature bytes.
pub fn sign_value<T: Serialize>(signer: &dyn Signer, value: &T) -> CoreResult<Vec<u8>> {
    Ok(signer.sign(&canonical(value)?))
}

/// Verify `signature` against the canonical encoding of `value`.
pub fn verify_value<T: Serialize>(
    signer: &dyn Signer,
    value: &T,
    signature: &[u8],
) -> CoreResult<()> {
    if signer.verify(&canonical(value)?, signature) {
        Ok(())
    } else {
        Err(CoreError::InvalidSignature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sign_then_verify_round_trips() {
        let signer = HmacSigner::new(b"test-key".to_vec());
        let value = json!({"a": 1, "b": "two"});
        let sig = sign_value(&signer, &value).unwrap();
        assert!(verify_value(&signer, &value, &sig).is_ok());
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let signer = HmacSigner::new(b"test-key".to_vec());
        let sig = sign_value(&signer, &json!({"a": 1})).unwrap();
        assert!(verify_value(&signer, &json!({"a": 2}), &sig).is_err());
    }

    #[test]
    fn wrong_key_fails_verification() {
        let signer_a = HmacSigner::new(b"key-a".to_vec());
        let signer_b = HmacSigner::new(b"key-b".to_vec());
        let value = json!({"a": 1});
        let sig = sign_value(&signer_a, &value).unwrap();
        assert!(verify_value(&signer_b, &value, &sig).is_err());
    }
}
