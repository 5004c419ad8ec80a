//! Identity error types

use thiserror::Error;

/// Errors that can occur while building or parsing identity material
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Entropy source failure: {0}")]
    Entropy(String),

    #[error("Invalid device id: {0}")]
    InvalidDeviceId(String),

    #[error("Invalid user id: {0}")]
    InvalidUserId(String),

    #[error("Invalid key id: {0}")]
    InvalidKeyId(String),

    #[error("Invalid device name: {0}")]
    InvalidDeviceName(String),

    #[error("Unknown device type: {0}")]
    UnknownDeviceType(String),

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("User {0} has no password salt")]
    MissingSalt(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Delegation rejected: {0}")]
    DelegationRejected(String),
}
