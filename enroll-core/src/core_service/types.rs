//! Request and response types exchanged with the identity service

use crate::core_identity::{hex_bytes, DeviceId, SignedDelegation, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Server-held half of a device's local key security secret
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct ServerHalf(#[serde(with = "hex_bytes")] Vec<u8>);

impl ServerHalf {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for ServerHalf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ServerHalf(<redacted>)")
    }
}

/// Server half upload bundled with a device's delegations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerHalfUpload {
    pub device_id: DeviceId,
    pub server_half: ServerHalf,
    pub generation: u32,
}

/// All links created for one new device, posted in a single request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationBatch {
    pub uid: UserId,
    pub links: Vec<SignedDelegation>,
    pub lks_server_half: Option<ServerHalfUpload>,
}

/// Acknowledgement of an accepted batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushAck {
    /// Chain seqno after the batch was applied
    pub seqno: u64,
}

/// Secrets the service holds for one device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSecrets {
    pub device_id: DeviceId,
    pub server_half: ServerHalf,
    pub generation: u32,
}
