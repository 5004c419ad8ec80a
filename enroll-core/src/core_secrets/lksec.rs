//! Local key security
//!
//! A device secret split in two halves. The client half is derived from the
//! user's passphrase, the server half is random and stored by the identity
//! service. Neither half alone decrypts anything.
//!
//! Ciphertext format:
//! ```text
//! [Version: 1 byte][Generation: 4 bytes BE][Nonce: 12 bytes][Ciphertext + tag]
//! ```

use super::errors::SecretError;
use crate::core_service::ServerHalf;
use argon2::{Argon2, Params};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::TryRngCore;
use secrecy::{ExposeSecret, Secret, SecretString};
use sha2::Sha256;
use std::fmt;
use zeroize::Zeroizing;

/// Length of each secret half
pub const LKS_SECRET_LEN: usize = 32;

const FORMAT_VERSION: u8 = 1;
const NONCE_LEN: usize = 12;
const HEADER_LEN: usize = 1 + 4 + NONCE_LEN;
const HKDF_INFO: &[u8] = b"enroll lksec encryption v1";
const MIN_SALT_LEN: usize = 8;

pub struct LocalKeySecurity {
    client_half: Option<Secret<[u8; LKS_SECRET_LEN]>>,
    server_half: Option<ServerHalf>,
    generation: u32,
}

impl LocalKeySecurity {
    /// Empty instance; a client half must be set before a server half can be generated
    pub fn new() -> Self {
        Self {
            client_half: None,
            server_half: None,
            generation: 0,
        }
    }

    /// Derive the client half from a passphrase with Argon2id
    pub fn from_passphrase(passphrase: &SecretString, salt: &[u8]) -> Result<Self, SecretError> {
        if salt.len() < MIN_SALT_LEN {
            return Err(SecretError::Kdf(format!(
                "salt must be at least {} bytes",
                MIN_SALT_LEN
            )));
        }
        let params = Params::new(19 * 1024, 2, 1, Some(LKS_SECRET_LEN))
            .map_err(|e| SecretError::Kdf(format!("Invalid Argon2 params: {}", e)))?;
        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

        let mut half = [0u8; LKS_SECRET_LEN];
        argon2
            .hash_password_into(passphrase.expose_secret().as_bytes(), salt, &mut half)
            .map_err(|e| SecretError::Kdf(e.to_string()))?;
        Ok(Self::with_client_half(half))
    }

    pub fn with_client_half(half: [u8; LKS_SECRET_LEN]) -> Self {
        Self {
            client_half: Some(Secret::new(half)),
            ..Self::new()
        }
    }

    pub fn has_client_half(&self) -> bool {
        self.client_half.is_some()
    }

    /// Generate a fresh random server half and bump the generation
    pub fn generate_server_half(&mut self) -> Result<ServerHalf, SecretError> {
        if self.client_half.is_none() {
            return Err(SecretError::MissingClientHalf);
        }
        let mut bytes = vec![0u8; LKS_SECRET_LEN];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| SecretError::Entropy(e.to_string()))?;
        let half = ServerHalf::new(bytes);
        self.server_half = Some(half.clone());
        self.generation += 1;
        Ok(half)
    }

    /// Install a server half downloaded from the identity service
    pub fn set_server_half(&mut self, half: ServerHalf, generation: u32) {
        self.server_half = Some(half);
        self.generation = generation;
    }

    pub fn server_half(&self) -> Option<&ServerHalf> {
        self.server_half.as_ref()
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    fn combined_secret(&self) -> Result<Zeroizing<[u8; LKS_SECRET_LEN]>, SecretError> {
        let client = self
            .client_half
            .as_ref()
            .ok_or(SecretError::MissingClientHalf)?;
        let server = self
            .server_half
            .as_ref()
            .ok_or(SecretError::MissingServerHalf)?;
        if server.as_bytes().len() != LKS_SECRET_LEN {
            return Err(SecretError::MissingServerHalf);
        }

        let mut combined = Zeroizing::new([0u8; LKS_SECRET_LEN]);
        for (i, byte) in combined.iter_mut().enumerate() {
            *byte = client.expose_secret()[i] ^ server.as_bytes()[i];
        }
        Ok(combined)
    }

    fn cipher(&self) -> Result<ChaCha20Poly1305, SecretError> {
        let combined = self.combined_secret()?;
        let hk = Hkdf::<Sha256>::new(None, &combined[..]);
        let mut key = Zeroizing::new([0u8; 32]);
        hk.expand(HKDF_INFO, &mut key[..])
            .map_err(|e| SecretError::Kdf(e.to_string()))?;
        ChaCha20Poly1305::new_from_slice(&key[..])
            .map_err(|e| SecretError::Encryption(format!("Invalid key: {}", e)))
    }

    /// Encrypt with the combined secret
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, SecretError> {
        let cipher = self.cipher()?;
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng
            .try_fill_bytes(&mut nonce_bytes)
            .map_err(|e| SecretError::Entropy(e.to_string()))?;

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|e| SecretError::Encryption(e.to_string()))?;

        let mut out = Vec::with_capacity(HEADER_LEN + ciphertext.len());
        out.push(FORMAT_VERSION);
        out.extend_from_slice(&self.generation.to_be_bytes());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, SecretError> {
        if data.len() < HEADER_LEN + 16 || data[0] != FORMAT_VERSION {
            return Err(SecretError::Decryption);
        }
        let cipher = self.cipher()?;
        let nonce = Nonce::from_slice(&data[5..HEADER_LEN]);
        cipher
            .decrypt(nonce, &data[HEADER_LEN..])
            .map_err(|_| SecretError::Decryption)
    }
}

impl Default for LocalKeySecurity {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LocalKeySecurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalKeySecurity")
            .field("client_half", &self.client_half.is_some())
            .field("server_half", &self.server_half.is_some())
            .field("generation", &self.generation)
            .finish()
    }
}
