//! User snapshot
//!
//! A point-in-time copy of a user's identity as known to this client: the key
//! chain, password salt, and which device (if any) this install runs as.

use super::device_id::DeviceId;
use super::error::IdentityError;
use super::key_chain::KeyChain;
use super::user_id::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A user at a specific eldest key generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserVersion {
    pub uid: UserId,
    pub eldest_seqno: u64,
}

impl fmt::Display for UserVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%{}", self.uid, self.eldest_seqno)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSnapshot {
    uid: UserId,
    username: String,
    #[serde(with = "super::delegation::hex_bytes")]
    salt: Vec<u8>,
    key_chain: KeyChain,
    /// Device this install is registered as, if any
    installed_device: Option<DeviceId>,
}

impl UserSnapshot {
    /// Snapshot of a user with an empty key chain
    pub fn new(username: impl Into<String>, salt: Vec<u8>) -> Self {
        let username = username.into();
        Self {
            uid: UserId::from_username(&username),
            username,
            salt,
            key_chain: KeyChain::new(),
            installed_device: None,
        }
    }

    pub fn with_key_chain(mut self, key_chain: KeyChain) -> Self {
        self.key_chain = key_chain;
        self
    }

    pub fn with_installed_device(mut self, device: Option<DeviceId>) -> Self {
        self.installed_device = device;
        self
    }

    pub fn uid(&self) -> UserId {
        self.uid
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Lowercased username, as used in the local config
    pub fn normalized_name(&self) -> String {
        self.username.trim().to_lowercase()
    }

    pub fn user_version(&self) -> UserVersion {
        UserVersion {
            uid: self.uid,
            eldest_seqno: self.key_chain.eldest_seqno(),
        }
    }

    /// Password salt; a user without one cannot be activated locally
    pub fn salt(&self) -> Result<&[u8], IdentityError> {
        if self.salt.is_empty() {
            return Err(IdentityError::MissingSalt(self.username.clone()));
        }
        Ok(&self.salt)
    }

    pub fn key_chain(&self) -> &KeyChain {
        &self.key_chain
    }

    pub fn installed_device(&self) -> Option<DeviceId> {
        self.installed_device
    }

    /// True when this install is registered as a device that is still live in the key chain
    pub fn has_current_device_in_current_install(&self) -> bool {
        self.installed_device
            .map_or(false, |id| self.key_chain.has_active_device(&id))
    }
}
