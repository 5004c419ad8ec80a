//! Delegation statements
//!
//! A delegation binds a new key into a user's key chain. The statement body is
//! encoded as JSON and signed with Ed25519:
//!
//! - `Eldest`: the very first signing key, signed by itself
//! - `Sibkey`: a further signing key, signed by an existing sibkey and counter-signed
//!   by the new key (reverse signature)
//! - `Subkey`: an encryption key, signed by its parent signing key

use super::device::DeviceIdentity;
use super::error::IdentityError;
use super::key_id::KeyId;
use super::keys::{verify_with_kid, SigningKey};
use super::user_id::UserId;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Kind of key being delegated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelegationKind {
    Eldest,
    Sibkey,
    Subkey,
}

/// The signed part of a delegation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationBody {
    pub kind: DelegationKind,
    pub uid: UserId,
    pub username: String,
    /// Position in the user's signature chain
    pub seqno: u64,
    /// Eldest key of the chain (equal to `delegated_kid` for an eldest link)
    pub eldest_kid: KeyId,
    pub signer_kid: KeyId,
    pub delegated_kid: KeyId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceIdentity>,
    /// Creation time, seconds since the Unix epoch
    pub ctime: u64,
}

impl DelegationBody {
    /// Bytes covered by the signatures
    pub fn payload(&self) -> Result<Vec<u8>, IdentityError> {
        serde_json::to_vec(self).map_err(|e| IdentityError::Encoding(e.to_string()))
    }
}

/// A delegation body with its signatures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedDelegation {
    pub body: DelegationBody,
    #[serde(with = "hex_bytes")]
    pub sig: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "opt_hex_bytes")]
    pub reverse_sig: Option<Vec<u8>>,
}

impl SignedDelegation {
    /// Sign `body` with `signer`; `delegate` adds the reverse signature for sibkeys
    pub fn sign(
        body: DelegationBody,
        signer: &SigningKey,
        delegate: Option<&SigningKey>,
    ) -> Result<Self, IdentityError> {
        if &body.signer_kid != signer.kid() {
            return Err(IdentityError::DelegationRejected(
                "signer key does not match signer_kid".to_string(),
            ));
        }
        let payload = body.payload()?;
        let reverse_sig = match delegate {
            Some(key) => Some(key.sign(&payload)?),
            None => None,
        };
        let sig = signer.sign(&payload)?;
        Ok(Self { body, sig, reverse_sig })
    }

    /// Check the signatures (not the chain authority of the signer)
    pub fn verify_signatures(&self) -> Result<(), IdentityError> {
        let payload = self.body.payload()?;
        if !verify_with_kid(&self.body.signer_kid, &payload, &self.sig) {
            return Err(IdentityError::DelegationRejected(format!(
                "bad signature from {}",
                self.body.signer_kid
            )));
        }
        match self.body.kind {
            DelegationKind::Eldest => {
                if self.body.signer_kid != self.body.delegated_kid {
                    return Err(IdentityError::DelegationRejected(
                        "eldest key must sign itself".to_string(),
                    ));
                }
            }
            DelegationKind::Sibkey => {
                let reverse = self.reverse_sig.as_deref().ok_or_else(|| {
                    IdentityError::DelegationRejected("sibkey missing reverse signature".to_string())
                })?;
                if !verify_with_kid(&self.body.delegated_kid, &payload, reverse) {
                    return Err(IdentityError::DelegationRejected(
                        "bad reverse signature".to_string(),
                    ));
                }
            }
            DelegationKind::Subkey => {}
        }
        Ok(())
    }
}

/// Seconds since the Unix epoch
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

pub(crate) mod opt_hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => serializer.serialize_some(&hex::encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|s| hex::decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_identity::{DeviceId, DeviceType, EncryptionKey};

    fn body(kind: DelegationKind, signer: &KeyId, delegated: &KeyId, eldest: &KeyId) -> DelegationBody {
        DelegationBody {
            kind,
            uid: UserId::from_username("alice"),
            username: "alice".to_string(),
            seqno: 1,
            eldest_kid: eldest.clone(),
            signer_kid: signer.clone(),
            delegated_kid: delegated.clone(),
            device: Some(
                DeviceIdentity::new(DeviceId::generate().unwrap(), "laptop", DeviceType::Desktop)
                    .unwrap(),
            ),
            ctime: unix_now(),
        }
    }

    #[test]
    fn test_eldest_self_signed() {
        let key = SigningKey::generate().unwrap();
        let b = body(DelegationKind::Eldest, key.kid(), key.kid(), key.kid());
        let signed = SignedDelegation::sign(b, &key, None).unwrap();
        assert!(signed.verify_signatures().is_ok());
    }

    #[test]
    fn test_sibkey_requires_reverse_sig() {
        let existing = SigningKey::generate().unwrap();
        let new_key = SigningKey::generate().unwrap();
        let b = body(DelegationKind::Sibkey, existing.kid(), new_key.kid(), existing.kid());

        let without = SignedDelegation::sign(b.clone(), &existing, None).unwrap();
        assert!(without.verify_signatures().is_err());

        let with = SignedDelegation::sign(b, &existing, Some(&new_key)).unwrap();
        assert!(with.verify_signatures().is_ok());
    }

    #[test]
    fn test_tampered_body_fails() {
        let key = SigningKey::generate().unwrap();
        let enc = EncryptionKey::generate().unwrap();
        let b = body(DelegationKind::Subkey, key.kid(), enc.kid(), key.kid());
        let mut signed = SignedDelegation::sign(b, &key, None).unwrap();
        signed.body.seqno = 7;
        assert!(signed.verify_signatures().is_err());
    }

    #[test]
    fn test_sign_rejects_mismatched_signer() {
        let key = SigningKey::generate().unwrap();
        let other = SigningKey::generate().unwrap();
        let b = body(DelegationKind::Eldest, other.kid(), other.kid(), other.kid());
        assert!(SignedDelegation::sign(b, &key, None).is_err());
    }

    #[test]
    fn test_json_roundtrip_keeps_signatures_valid() {
        let existing = SigningKey::generate().unwrap();
        let new_key = SigningKey::generate().unwrap();
        let b = body(DelegationKind::Sibkey, existing.kid(), new_key.kid(), existing.kid());
        let signed = SignedDelegation::sign(b, &existing, Some(&new_key)).unwrap();

        let json = serde_json::to_string(&signed).unwrap();
        let back: SignedDelegation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, signed);
        assert!(back.verify_signatures().is_ok());
    }
}
