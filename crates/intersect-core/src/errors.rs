//! Shared error type for primitive-level failures (encoding, hashing,
//! signing). Component crates define their own error enums and convert
//! from `CoreError` where a primitive operation can fail underneath them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, Error)]
pub enum CoreError {
    #[error("malformed encoded token: {message}")]
    MalformedToken { message: String },

    #[error("unknown wire version: {version}")]
    UnknownVersion { version: u8 },

    #[error("signature verification failed")]
    InvalidSignature,

    #[error("canonical encoding failed: {message}")]
    EncodingFailed { message: String },
}

pub type CoreResult<T> = Result<T, CoreError>;
