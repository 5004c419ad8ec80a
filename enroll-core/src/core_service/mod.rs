//! Identity service boundary
//!
//! The remote service owns the authoritative copy of every user's key chain.
//! Transport and retry policy live behind [`IdentityService`]; this crate ships
//! an in-process [`LoopbackIdentityService`] for offline use and tests.

use crate::core_identity::{DeviceId, UserId, UserSnapshot};
use async_trait::async_trait;

mod errors;
mod loopback;
mod timeout;
mod types;

pub use errors::{ServiceError, ServiceResult};
pub use loopback::LoopbackIdentityService;
pub use timeout::TimeoutIdentityService;
pub use types::{DelegationBatch, DeviceSecrets, PushAck, ServerHalf, ServerHalfUpload};

/// Calls made against the remote identity service
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Post the delegations for a new device. The batch is applied entirely or not at all.
    async fn post_delegations(&self, batch: &DelegationBatch) -> ServiceResult<PushAck>;

    /// Fetch the authoritative state of a user
    async fn load_user(&self, uid: &UserId) -> ServiceResult<UserSnapshot>;

    /// Download the secrets held for one of the user's devices
    async fn fetch_device_secrets(
        &self,
        uid: &UserId,
        device_id: &DeviceId,
    ) -> ServiceResult<DeviceSecrets>;
}
