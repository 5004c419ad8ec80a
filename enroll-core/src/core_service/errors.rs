//! Error types for the identity service boundary

use crate::core_identity::{IdentityError, UserId};
use std::time::Duration;
use thiserror::Error;

/// Result type for identity service calls
pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Transport-level failure; the request may or may not have been applied
    #[error("Identity service unavailable: {0}")]
    Unavailable(String),

    #[error("Identity service call {method} timed out after {timeout:?}")]
    TimedOut {
        method: &'static str,
        timeout: Duration,
    },

    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error("No secrets stored for device {0}")]
    SecretsNotFound(String),

    /// The service refused the request
    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("User already exists: {0}")]
    UserExists(String),
}

impl From<IdentityError> for ServiceError {
    fn from(e: IdentityError) -> Self {
        ServiceError::Rejected(e.to_string())
    }
}
