//! Key identifiers (KIDs)
//!
//! Layout: `[0x01 version][algorithm byte][32-byte public key][0x0a suffix]`, hex encoded.

use super::error::IdentityError;
use super::keypair::KeyType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const KID_VERSION: u8 = 0x01;
const KID_SUFFIX: u8 = 0x0a;
const ALGO_ED25519: u8 = 0x20;
const ALGO_X25519: u8 = 0x21;
const KID_LEN: usize = 35;

/// Identifier of a public key in a user's key chain
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId(Vec<u8>);

impl KeyId {
    /// Build the KID of a public key
    pub fn from_public_key(key_type: KeyType, public: &[u8]) -> Result<Self, IdentityError> {
        if public.len() != 32 {
            return Err(IdentityError::InvalidKeyId(format!(
                "public key must be 32 bytes, got {}",
                public.len()
            )));
        }
        let algo = match key_type {
            KeyType::Ed25519 => ALGO_ED25519,
            KeyType::X25519 => ALGO_X25519,
        };
        let mut bytes = Vec::with_capacity(KID_LEN);
        bytes.push(KID_VERSION);
        bytes.push(algo);
        bytes.extend_from_slice(public);
        bytes.push(KID_SUFFIX);
        Ok(KeyId(bytes))
    }

    /// Algorithm of the identified key
    pub fn key_type(&self) -> KeyType {
        if self.0[1] == ALGO_X25519 {
            KeyType::X25519
        } else {
            KeyType::Ed25519
        }
    }

    /// The embedded public key
    pub fn public_key(&self) -> &[u8] {
        &self.0[2..KID_LEN - 1]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl FromStr for KeyId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| IdentityError::InvalidKeyId(e.to_string()))?;
        if bytes.len() != KID_LEN || bytes[0] != KID_VERSION || bytes[KID_LEN - 1] != KID_SUFFIX {
            return Err(IdentityError::InvalidKeyId(format!("malformed kid {}", s)));
        }
        if bytes[1] != ALGO_ED25519 && bytes[1] != ALGO_X25519 {
            return Err(IdentityError::InvalidKeyId(format!("unknown algorithm 0x{:02x}", bytes[1])));
        }
        Ok(KeyId(bytes))
    }
}

impl Serialize for KeyId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for KeyId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
