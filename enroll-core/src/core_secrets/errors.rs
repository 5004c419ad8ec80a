//! Error types for the local secret store

use crate::core_service::ServiceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("Local key security has no client half")]
    MissingClientHalf,

    #[error("Local key security has no server half")]
    MissingServerHalf,

    #[error("Key derivation failed: {0}")]
    Kdf(String),

    #[error("Entropy source failure: {0}")]
    Entropy(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// AEAD tag mismatch: wrong secret or corrupted data
    #[error("Decryption failed")]
    Decryption,

    #[error("Secret sync failed: {0}")]
    Sync(#[from] ServiceError),
}
