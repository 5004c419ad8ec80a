//! The active device record

use super::errors::SwapError;
use crate::core_identity::{
    validate_device_name, DeviceId, EncryptionKey, SigningKey, UserId, UserVersion,
};
use serde::{Deserialize, Serialize};

/// Everything needed to make a device the active one
#[derive(Debug, Clone)]
pub struct DeviceSwitch {
    pub user_version: UserVersion,
    pub normalized_name: String,
    pub salt: Vec<u8>,
    pub device_id: DeviceId,
    pub device_name: String,
    pub signing_key: SigningKey,
    pub encryption_key: EncryptionKey,
}

impl DeviceSwitch {
    pub(crate) fn validate(&self) -> Result<(), SwapError> {
        if self.normalized_name.is_empty() {
            return Err(SwapError::Invalid("empty username".to_string()));
        }
        if UserId::from_username(&self.normalized_name) != self.user_version.uid {
            return Err(SwapError::Invalid(format!(
                "username {} does not belong to {}",
                self.normalized_name, self.user_version.uid
            )));
        }
        if self.salt.is_empty() {
            return Err(SwapError::Invalid("empty salt".to_string()));
        }
        validate_device_name(&self.device_name).map_err(|e| SwapError::Invalid(e.to_string()))
    }
}

/// The device this process currently operates as. Never mutated; a switch
/// replaces the whole record.
#[derive(Debug, Clone)]
pub struct ActiveDevice {
    user_version: UserVersion,
    normalized_name: String,
    salt: Vec<u8>,
    device_id: DeviceId,
    device_name: String,
    signing_key: SigningKey,
    encryption_key: EncryptionKey,
}

impl ActiveDevice {
    pub fn uid(&self) -> UserId {
        self.user_version.uid
    }

    pub fn user_version(&self) -> UserVersion {
        self.user_version
    }

    pub fn normalized_name(&self) -> &str {
        &self.normalized_name
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn encryption_key(&self) -> &EncryptionKey {
        &self.encryption_key
    }

    /// Public part of the record, as persisted in the user config
    pub fn user_config(&self) -> UserConfig {
        UserConfig {
            uid: self.user_version.uid,
            username: self.normalized_name.clone(),
            eldest_seqno: self.user_version.eldest_seqno,
            salt: self.salt.clone(),
            device_id: self.device_id,
            device_name: self.device_name.clone(),
            signing_kid: self.signing_key.kid().to_string(),
            encryption_kid: self.encryption_key.kid().to_string(),
        }
    }
}

impl From<DeviceSwitch> for ActiveDevice {
    fn from(s: DeviceSwitch) -> Self {
        Self {
            user_version: s.user_version,
            normalized_name: s.normalized_name,
            salt: s.salt,
            device_id: s.device_id,
            device_name: s.device_name,
            signing_key: s.signing_key,
            encryption_key: s.encryption_key,
        }
    }
}

/// Persisted user config: which user and device this install runs as.
/// Holds no private key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    pub uid: UserId,
    pub username: String,
    pub eldest_seqno: u64,
    #[serde(with = "crate::core_identity::hex_bytes")]
    pub salt: Vec<u8>,
    pub device_id: DeviceId,
    pub device_name: String,
    pub signing_kid: String,
    pub encryption_kid: String,
}
