//! Device identity
//!
//! A device is named by its owner, tagged with a [`DeviceType`] and identified by a
//! [`DeviceId`]. Once built, a [`DeviceIdentity`] never changes.

use super::device_id::DeviceId;
use super::error::IdentityError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Minimum device name length (in characters)
pub const MIN_DEVICE_NAME_LEN: usize = 3;

/// Maximum device name length (in characters)
pub const MAX_DEVICE_NAME_LEN: usize = 64;

const NAME_SEPARATORS: &[char] = &[' ', '_', '\'', '.', '+', '-'];

/// Kind of device being provisioned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Desktop,
    Mobile,
    /// Offline backup key (paper key)
    Backup,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Desktop => "desktop",
            DeviceType::Mobile => "mobile",
            DeviceType::Backup => "backup",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "desktop" => Ok(DeviceType::Desktop),
            "mobile" => Ok(DeviceType::Mobile),
            "backup" | "paper" => Ok(DeviceType::Backup),
            other => Err(IdentityError::UnknownDeviceType(other.to_string())),
        }
    }
}

impl Default for DeviceType {
    fn default() -> Self {
        DeviceType::Desktop
    }
}

/// Check a human-readable device name.
///
/// Names are 3 to 64 characters of ASCII letters, digits and the separators
/// `space _ ' . + -`, must start and end with a letter or digit, and may not
/// contain two separators in a row.
pub fn validate_device_name(name: &str) -> Result<(), IdentityError> {
    let len = name.chars().count();
    if !(MIN_DEVICE_NAME_LEN..=MAX_DEVICE_NAME_LEN).contains(&len) {
        return Err(IdentityError::InvalidDeviceName(format!(
            "length must be between {} and {} characters",
            MIN_DEVICE_NAME_LEN, MAX_DEVICE_NAME_LEN
        )));
    }

    let mut prev_sep = false;
    for (i, c) in name.chars().enumerate() {
        let is_sep = NAME_SEPARATORS.contains(&c);
        if !(c.is_ascii_alphanumeric() || is_sep) {
            return Err(IdentityError::InvalidDeviceName(format!("invalid character {:?}", c)));
        }
        if is_sep && (i == 0 || i == len - 1) {
            return Err(IdentityError::InvalidDeviceName(
                "must start and end with a letter or digit".to_string(),
            ));
        }
        if is_sep && prev_sep {
            return Err(IdentityError::InvalidDeviceName(
                "consecutive separators are not allowed".to_string(),
            ));
        }
        prev_sep = is_sep;
    }
    Ok(())
}

/// A device's identity: id, name and type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    id: DeviceId,
    name: String,
    device_type: DeviceType,
}

impl DeviceIdentity {
    /// Build a device identity, validating the name
    pub fn new(
        id: DeviceId,
        name: impl Into<String>,
        device_type: DeviceType,
    ) -> Result<Self, IdentityError> {
        let name = name.into();
        validate_device_name(&name)?;
        Ok(Self { id, name, device_type })
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }
}
