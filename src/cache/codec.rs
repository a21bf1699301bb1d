//! Payload encoding and integrity checking.
//!
//! Payloads are MessagePack-encoded record lists; the checksum stored in the
//! metadata is the SHA-256 of those bytes, so a read can verify that the two
//! independently written keys belong to the same refresh.

use crate::error::CacheError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

pub fn encode_records<T: Serialize>(records: &[T]) -> Result<Vec<u8>, CacheError> {
    Ok(rmp_serde::to_vec(records)?)
}

pub fn decode_records<T: DeserializeOwned>(bytes: &[u8]) -> Result<Vec<T>, CacheError> {
    Ok(rmp_serde::from_slice(bytes)?)
}

/// SHA-256 of the payload bytes as a hex string.
pub fn payload_checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
