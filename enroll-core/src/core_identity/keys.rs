//! Device key roles
//!
//! A provisioned device owns one Ed25519 signing key (a sibkey in the user's key
//! chain) and one X25519 encryption key (a subkey delegated by the signing key).

use super::error::IdentityError;
use super::key_id::KeyId;
use super::keypair::{KeyType, Keypair};

/// Device signing key (Ed25519)
#[derive(Clone, Debug)]
pub struct SigningKey {
    keypair: Keypair,
    kid: KeyId,
}

impl SigningKey {
    /// Generate a fresh signing key
    pub fn generate() -> Result<Self, IdentityError> {
        Self::from_keypair(Keypair::generate(KeyType::Ed25519)?)
    }

    /// Deterministic key from a seed (fixtures and recovery)
    pub fn from_seed(seed: &[u8; 32]) -> Result<Self, IdentityError> {
        Self::from_keypair(Keypair::from_seed(KeyType::Ed25519, seed))
    }

    fn from_keypair(keypair: Keypair) -> Result<Self, IdentityError> {
        let kid = KeyId::from_public_key(keypair.key_type(), keypair.public_key())?;
        Ok(Self { keypair, kid })
    }

    pub fn kid(&self) -> &KeyId {
        &self.kid
    }

    pub fn public_key(&self) -> &[u8] {
        self.keypair.public_key()
    }

    pub fn sign(&self, msg: &[u8]) -> Result<Vec<u8>, IdentityError> {
        self.keypair.sign(msg)
    }

    pub fn verify(&self, msg: &[u8], sig: &[u8]) -> bool {
        Keypair::verify(self.public_key(), msg, sig)
    }
}

/// Verify a signature against the Ed25519 key named by `kid`
pub fn verify_with_kid(kid: &KeyId, msg: &[u8], sig: &[u8]) -> bool {
    kid.key_type() == KeyType::Ed25519 && Keypair::verify(kid.public_key(), msg, sig)
}

/// Device encryption key (X25519)
#[derive(Clone, Debug)]
pub struct EncryptionKey {
    keypair: Keypair,
    kid: KeyId,
}

impl EncryptionKey {
    /// Generate a fresh encryption key
    pub fn generate() -> Result<Self, IdentityError> {
        let keypair = Keypair::generate(KeyType::X25519)?;
        let kid = KeyId::from_public_key(KeyType::X25519, keypair.public_key())?;
        Ok(Self { keypair, kid })
    }

    /// Deterministic key from a seed (fixtures and recovery)
    pub fn from_seed(seed: &[u8; 32]) -> Result<Self, IdentityError> {
        let keypair = Keypair::from_seed(KeyType::X25519, seed);
        let kid = KeyId::from_public_key(KeyType::X25519, keypair.public_key())?;
        Ok(Self { keypair, kid })
    }

    pub fn kid(&self) -> &KeyId {
        &self.kid
    }

    pub fn public_key(&self) -> &[u8] {
        self.keypair.public_key()
    }

    /// Shared secret with a peer's X25519 public key
    pub fn agree(&self, peer_public: &[u8]) -> Result<[u8; 32], IdentityError> {
        self.keypair.diffie_hellman(peer_public)
    }
}
