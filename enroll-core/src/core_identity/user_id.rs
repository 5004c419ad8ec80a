//! User ID module
//!
//! Defines the stable identifier for a user identity.

use super::error::IdentityError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Length of a user id in bytes
pub const USER_ID_LEN: usize = 16;

/// Trailing byte tagging an id as a user id
pub const USER_ID_SUFFIX: u8 = 0x19;

/// UserId is a stable ID for a user, derived from the normalized username
/// with SHA-256 truncated to 15 bytes plus [`USER_ID_SUFFIX`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId([u8; USER_ID_LEN]);

impl UserId {
    /// Derive the UserId for a username (case-insensitive)
    pub fn from_username(username: &str) -> Self {
        let normalized = username.trim().to_lowercase();
        let hash = Sha256::digest(normalized.as_bytes());
        let mut bytes = [0u8; USER_ID_LEN];
        bytes[..USER_ID_LEN - 1].copy_from_slice(&hash[..USER_ID_LEN - 1]);
        bytes[USER_ID_LEN - 1] = USER_ID_SUFFIX;
        UserId(bytes)
    }

    /// Create a UserId from raw bytes (for deserialization)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdentityError> {
        let arr: [u8; USER_ID_LEN] = bytes
            .try_into()
            .map_err(|_| IdentityError::InvalidUserId(format!("bad length {}", bytes.len())))?;
        if arr[USER_ID_LEN - 1] != USER_ID_SUFFIX {
            return Err(IdentityError::InvalidUserId("bad suffix".to_string()));
        }
        Ok(UserId(arr))
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for UserId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| IdentityError::InvalidUserId(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

impl Serialize for UserId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
