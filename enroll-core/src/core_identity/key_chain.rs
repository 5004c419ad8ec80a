//! Key chain
//!
//! The authoritative set of keys delegated to a user, as reported by the identity
//! service. Delegations are appended strictly in seqno order.

use super::delegation::{DelegationKind, SignedDelegation};
use super::device::DeviceIdentity;
use super::device_id::DeviceId;
use super::error::IdentityError;
use super::key_id::KeyId;
use super::keypair::KeyType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A device as recorded in the key chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub device: DeviceIdentity,
    pub signing_kid: KeyId,
    pub encryption_kid: Option<KeyId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyChain {
    eldest_kid: Option<KeyId>,
    /// Seqno of the eldest link (0 when the chain is empty)
    eldest_seqno: u64,
    /// Seqno of the last applied link
    seqno: u64,
    sibkeys: BTreeSet<KeyId>,
    /// Subkey -> parent sibkey
    subkeys: BTreeMap<KeyId, KeyId>,
    devices: BTreeMap<DeviceId, DeviceRecord>,
}

impl KeyChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eldest_kid(&self) -> Option<&KeyId> {
        self.eldest_kid.as_ref()
    }

    pub fn eldest_seqno(&self) -> u64 {
        self.eldest_seqno
    }

    pub fn seqno(&self) -> u64 {
        self.seqno
    }

    pub fn is_empty(&self) -> bool {
        self.eldest_kid.is_none()
    }

    pub fn has_sibkey(&self, kid: &KeyId) -> bool {
        self.sibkeys.contains(kid)
    }

    pub fn subkey_parent(&self, kid: &KeyId) -> Option<&KeyId> {
        self.subkeys.get(kid)
    }

    pub fn has_active_device(&self, id: &DeviceId) -> bool {
        self.devices.contains_key(id)
    }

    pub fn device(&self, id: &DeviceId) -> Option<&DeviceRecord> {
        self.devices.get(id)
    }

    pub fn devices(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.devices.values()
    }

    /// Verify a signed delegation against the current chain and append it.
    /// On error the chain is left untouched.
    pub fn apply(&mut self, link: &SignedDelegation) -> Result<(), IdentityError> {
        let mut next = self.clone();
        next.append(link)?;
        *self = next;
        Ok(())
    }

    fn append(&mut self, link: &SignedDelegation) -> Result<(), IdentityError> {
        link.verify_signatures()?;
        let body = &link.body;

        if body.seqno != self.seqno + 1 {
            return Err(IdentityError::DelegationRejected(format!(
                "expected seqno {}, got {}",
                self.seqno + 1,
                body.seqno
            )));
        }

        match body.kind {
            DelegationKind::Eldest => {
                if !self.is_empty() {
                    return Err(IdentityError::DelegationRejected(
                        "chain already has an eldest key".to_string(),
                    ));
                }
                if body.eldest_kid != body.delegated_kid {
                    return Err(IdentityError::DelegationRejected(
                        "eldest link must name itself as eldest".to_string(),
                    ));
                }
                self.eldest_kid = Some(body.delegated_kid.clone());
                self.eldest_seqno = body.seqno;
                self.sibkeys.insert(body.delegated_kid.clone());
            }
            DelegationKind::Sibkey => {
                self.check_authority(link)?;
                self.sibkeys.insert(body.delegated_kid.clone());
            }
            DelegationKind::Subkey => {
                self.check_authority(link)?;
                if body.delegated_kid.key_type() != KeyType::X25519 {
                    return Err(IdentityError::DelegationRejected(
                        "subkey must be an encryption key".to_string(),
                    ));
                }
                self.subkeys
                    .insert(body.delegated_kid.clone(), body.signer_kid.clone());
            }
        }

        if let Some(device) = &body.device {
            self.record_device(body.kind, device, &body.signer_kid, &body.delegated_kid)?;
        }
        self.seqno = body.seqno;
        Ok(())
    }

    fn check_authority(&self, link: &SignedDelegation) -> Result<(), IdentityError> {
        let body = &link.body;
        if self.eldest_kid.as_ref() != Some(&body.eldest_kid) {
            return Err(IdentityError::DelegationRejected(format!(
                "eldest kid {} does not match chain",
                body.eldest_kid
            )));
        }
        if !self.sibkeys.contains(&body.signer_kid) {
            return Err(IdentityError::DelegationRejected(format!(
                "signer {} is not an active sibkey",
                body.signer_kid
            )));
        }
        Ok(())
    }

    fn record_device(
        &mut self,
        kind: DelegationKind,
        device: &DeviceIdentity,
        signer: &KeyId,
        delegated: &KeyId,
    ) -> Result<(), IdentityError> {
        match kind {
            DelegationKind::Eldest | DelegationKind::Sibkey => {
                self.devices.insert(
                    device.id(),
                    DeviceRecord {
                        device: device.clone(),
                        signing_kid: delegated.clone(),
                        encryption_kid: None,
                    },
                );
            }
            DelegationKind::Subkey => {
                let record = self.devices.get_mut(&device.id()).ok_or_else(|| {
                    IdentityError::DelegationRejected(format!(
                        "subkey for unknown device {}",
                        device.id()
                    ))
                })?;
                if &record.signing_kid != signer {
                    return Err(IdentityError::DelegationRejected(
                        "subkey parent is not the device's signing key".to_string(),
                    ));
                }
                record.encryption_kid = Some(delegated.clone());
            }
        }
        Ok(())
    }
}
