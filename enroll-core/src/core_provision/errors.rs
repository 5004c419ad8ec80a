//! Provisioning error types

use super::keygen::KeygenError;
use crate::core_device::SwapError;
use crate::core_secrets::SecretError;
use crate::core_service::ServiceError;
use std::time::Duration;
use thiserror::Error;

/// Result type for provisioning operations
pub type ProvisionResult<T> = Result<T, ProvisionError>;

#[derive(Debug, Error)]
pub enum ProvisionError {
    /// This install already runs as a device of the user
    #[error("Already provisioned: {username} has a device on this install")]
    AlreadyProvisioned { username: String },

    /// Device id or local secret could not be allocated; nothing was sent
    #[error("Allocation failed: {0}")]
    Allocation(String),

    #[error("Key generation failed: {0}")]
    KeyGeneration(#[source] KeygenError),

    /// Keys were generated and are still held; only the push needs retrying
    #[error("Delegation push failed: {0}")]
    DelegationPush(#[source] KeygenError),

    #[error("User snapshot refresh failed: {0}")]
    SnapshotRefresh(#[source] ServiceError),

    #[error("Active device swap failed: {0}")]
    Swap(#[from] SwapError),

    #[error("Secret sync failed: {0}")]
    SecretSync(#[from] SecretError),

    #[error("Step {step} cancelled")]
    Cancelled { step: &'static str },

    #[error("Step {step} timed out after {timeout:?}")]
    TimedOut {
        step: &'static str,
        timeout: Duration,
    },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid provisioning arguments: {0}")]
    InvalidArgs(String),
}

impl ProvisionError {
    /// True when generated key material survived the failure and can be
    /// pushed again with [`DeviceProvisioner::push_keys`](super::DeviceProvisioner::push_keys)
    pub fn keys_retained(&self) -> bool {
        match self {
            ProvisionError::DelegationPush(_) => true,
            ProvisionError::Cancelled { step } | ProvisionError::TimedOut { step, .. } => {
                *step == super::STEP_PUSH_KEYS
            }
            _ => false,
        }
    }

    /// Whether the error aborts the flow
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ProvisionError::DelegationPush(_) | ProvisionError::SecretSync(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_retained_only_after_generation() {
        let push = ProvisionError::DelegationPush(KeygenError::NotGenerated);
        assert!(push.keys_retained());
        assert!(!push.is_fatal());

        let cancelled = ProvisionError::Cancelled {
            step: super::super::STEP_PUSH_KEYS,
        };
        assert!(cancelled.keys_retained());
        assert!(cancelled.is_fatal());

        let refresh = ProvisionError::Cancelled {
            step: super::super::STEP_REFRESH,
        };
        assert!(!refresh.keys_retained());

        let already = ProvisionError::AlreadyProvisioned {
            username: "alice".to_string(),
        };
        assert!(!already.keys_retained());
        assert!(already.is_fatal());
        assert!(already.to_string().contains("alice"));
    }
}
