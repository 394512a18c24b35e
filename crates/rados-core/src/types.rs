//! The content hash key type.
//!
//! A [`ContentHash`] is always 32 raw bytes, rendered externally as 64 lowercase hex
//! characters. The engine never computes one from content — it only validates, decodes,
//! and re-encodes hashes handed to it by a caller.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::RadosError;

/// 32-byte content-addressed key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash {
    bytes: [u8; 32],
}

impl ContentHash {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Validate and decode a 64-character lowercase hex string.
    ///
    /// Accepts a string iff it is exactly 64 characters long and every character is a
    /// lowercase hex digit. Anything else, including valid-but-uppercase hex, is rejected.
    pub fn from_hex(s: &str) -> Result<Self, RadosError> {
        if s.len() != 64 || !s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
            return Err(RadosError::InvalidKey);
        }

        let decoded = hex::decode(s).map_err(|_| RadosError::InvalidKey)?;
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&decoded);
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
