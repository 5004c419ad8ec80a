//! Active device error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SwapError {
    #[error("Invalid device switch: {0}")]
    Invalid(String),

    #[error("Failed to persist user config: {0}")]
    Persist(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
