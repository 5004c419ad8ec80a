//! Device ID module
//!
//! Uniquely identify each device under the same user.

use super::error::IdentityError;
use rand::rngs::OsRng;
use rand::TryRngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length of a device id in bytes
pub const DEVICE_ID_LEN: usize = 16;

/// Trailing byte tagging an id as a device id
pub const DEVICE_ID_SUFFIX: u8 = 0x18;

/// DeviceId uniquely identifies a device (unique per device)
///
/// 15 bytes from the OS RNG followed by [`DEVICE_ID_SUFFIX`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId([u8; DEVICE_ID_LEN]);

impl DeviceId {
    /// Allocate a fresh device id from the operating system RNG
    pub fn generate() -> Result<Self, IdentityError> {
        let mut bytes = [0u8; DEVICE_ID_LEN];
        OsRng
            .try_fill_bytes(&mut bytes[..DEVICE_ID_LEN - 1])
            .map_err(|e| IdentityError::Entropy(e.to_string()))?;
        bytes[DEVICE_ID_LEN - 1] = DEVICE_ID_SUFFIX;
        Ok(DeviceId(bytes))
    }

    /// Create a DeviceId from raw bytes, checking length and suffix
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdentityError> {
        let arr: [u8; DEVICE_ID_LEN] = bytes.try_into().map_err(|_| {
            IdentityError::InvalidDeviceId(format!(
                "expected {} bytes, got {}",
                DEVICE_ID_LEN,
                bytes.len()
            ))
        })?;
        if arr[DEVICE_ID_LEN - 1] != DEVICE_ID_SUFFIX {
            return Err(IdentityError::InvalidDeviceId(format!(
                "bad suffix 0x{:02x}",
                arr[DEVICE_ID_LEN - 1]
            )));
        }
        Ok(DeviceId(arr))
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Parse from hex string
    pub fn from_hex(s: &str) -> Result<Self, IdentityError> {
        let bytes = hex::decode(s).map_err(|e| IdentityError::InvalidDeviceId(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for DeviceId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for DeviceId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for DeviceId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        DeviceId::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
