//! `ApprovalRequestToken` and its opaque wire encoding.

use crate::errors::{ApprovalError, ApprovalResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use intersect_core::{ActionId, CircleId, IntersectionId, TokenId};
use serde::{Deserialize, Serialize};

const WIRE_PREFIX: &str = "intersect-approval.v1.";

/// A signed, self-describing token minted by `request_approval` and
/// handed to an approver out-of-band (a link, a CLI prompt). Decoding
/// does not itself prove validity — `submit_approval` re-verifies the
/// signature against the subsystem's signer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequestToken {
    pub token_id: TokenId,
    pub intersection_id: IntersectionId,
    pub contract_version: String,
    pub action_id: ActionId,
    pub action_hash: String,
    pub action_type: String,
    pub action_summary: String,
    pub requesting_circle_id: CircleId,
    pub scopes_required: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
}

impl ApprovalRequestToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// The signed payload: every field except the signature itself.
    fn signable(&self) -> SignablePayload<'_> {
        SignablePayload {
            token_id: &self.token_id,
            intersection_id: &self.intersection_id,
            contract_version: &self.contract_version,
            action_id: &self.action_id,
            action_hash: &self.action_hash,
            action_type: &self.action_type,
            action_summary: &self.action_summary,
            requesting_circle_id: &self.requesting_circle_id,
            scopes_required: &self.scopes_required,
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }

    pub fn signable_payload(&self) -> SignablePayload<'_> {
        self.signable()
    }
}

#[derive(Serialize)]
pub struct SignablePayload<'a> {
    token_id: &'a TokenId,
    intersection_id: &'a IntersectionId,
    contract_version: &'a str,
    action_id: &'a ActionId,
    action_hash: &'a str,
    action_type: &'a str,
    action_summary: &'a str,
    requesting_circle_id: &'a CircleId,
    scopes_required: &'a [String],
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// Encode a token into its opaque wire form: a versioned, base64-url
/// JSON blob. Not itself a security boundary — the signature inside is.
pub fn encode_token(token: &ApprovalRequestToken) -> ApprovalResult<String> {
    let json = serde_json::to_vec(token).map_err(|_| ApprovalError::MalformedToken)?;
    Ok(format!("{WIRE_PREFIX}{}", URL_SAFE_NO_PAD.encode(json)))
}

pub fn decode_token(wire: &str) -> ApprovalResult<ApprovalRequestToken> {
    let body = wire.strip_prefix(WIRE_PREFIX).ok_or(ApprovalError::MalformedToken)?;
    let json = URL_SAFE_NO_PAD
        .decode(body)
        .map_err(|_| ApprovalError::MalformedToken)?;
    serde_json::from_slice(&json).map_err(|_| ApprovalError::MalformedToken)
}

pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
