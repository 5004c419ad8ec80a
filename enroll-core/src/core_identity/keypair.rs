//! Keypair module
//!
//! Handles raw key material for device keys.
//! Uses Ed25519 for signatures and X25519 for key agreement.
//!
//! Security: Secret keys are automatically zeroized on drop using zeroize crate.

use super::error::IdentityError;
use ed25519_dalek::{Signature, Signer, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use rand::TryRngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::Zeroize;

/// Key type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    /// Ed25519 for signatures
    Ed25519,
    /// X25519 for Diffie-Hellman key exchange
    X25519,
}

/// Keypair structure holding public and secret keys
/// Secret keys are automatically zeroized on drop
#[derive(Clone)]
pub struct Keypair {
    /// Type of key
    key_type: KeyType,
    /// Public key bytes (32 bytes)
    public: Vec<u8>,
    /// Secret key bytes (32 bytes)
    secret: Vec<u8>,
}

impl Keypair {
    /// Generate a new keypair of the specified type from the OS RNG
    pub fn generate(key_type: KeyType) -> Result<Self, IdentityError> {
        let mut seed = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut seed)
            .map_err(|e| IdentityError::Entropy(e.to_string()))?;
        let kp = Self::from_seed(key_type, &seed);
        seed.zeroize();
        Ok(kp)
    }

    /// Build a keypair deterministically from a 32-byte seed
    pub fn from_seed(key_type: KeyType, seed: &[u8; 32]) -> Self {
        match key_type {
            KeyType::Ed25519 => {
                let signing_key = ed25519_dalek::SigningKey::from_bytes(seed);
                Keypair {
                    key_type,
                    public: signing_key.verifying_key().to_bytes().to_vec(),
                    secret: signing_key.to_bytes().to_vec(),
                }
            }
            KeyType::X25519 => {
                let secret = StaticSecret::from(*seed);
                let public = X25519PublicKey::from(&secret);
                Keypair {
                    key_type,
                    public: public.to_bytes().to_vec(),
                    secret: secret.to_bytes().to_vec(),
                }
            }
        }
    }

    fn secret_array(&self) -> Result<[u8; 32], IdentityError> {
        self.secret
            .as_slice()
            .try_into()
            .map_err(|_| IdentityError::InvalidKey("secret key must be 32 bytes".to_string()))
    }

    /// Sign a message (Ed25519 only)
    /// Returns 64-byte signature
    pub fn sign(&self, msg: &[u8]) -> Result<Vec<u8>, IdentityError> {
        if self.key_type != KeyType::Ed25519 {
            return Err(IdentityError::InvalidKey("only Ed25519 keys can sign".to_string()));
        }
        let mut secret = self.secret_array()?;
        let signing_key = ed25519_dalek::SigningKey::from_bytes(&secret);
        secret.zeroize();
        Ok(signing_key.sign(msg).to_bytes().to_vec())
    }

    /// Verify an Ed25519 signature (static method)
    /// Returns true if signature is valid
    pub fn verify(pubkey: &[u8], msg: &[u8], sig: &[u8]) -> bool {
        let Ok(pubkey) = <[u8; 32]>::try_from(pubkey) else {
            return false;
        };
        let Ok(verifying_key) = VerifyingKey::from_bytes(&pubkey) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(sig) else {
            return false;
        };
        verifying_key.verify(msg, &signature).is_ok()
    }

    /// X25519 agreement with a peer public key (X25519 only)
    pub fn diffie_hellman(&self, peer_public: &[u8]) -> Result<[u8; 32], IdentityError> {
        if self.key_type != KeyType::X25519 {
            return Err(IdentityError::InvalidKey("only X25519 keys can agree".to_string()));
        }
        let peer: [u8; 32] = peer_public
            .try_into()
            .map_err(|_| IdentityError::InvalidKey("peer key must be 32 bytes".to_string()))?;
        let secret = StaticSecret::from(self.secret_array()?);
        Ok(secret.diffie_hellman(&X25519PublicKey::from(peer)).to_bytes())
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    /// Get reference to public key
    pub fn public_key(&self) -> &[u8] {
        &self.public
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("key_type", &self.key_type)
            .field("public", &hex::encode(&self.public))
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl Drop for Keypair {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}
