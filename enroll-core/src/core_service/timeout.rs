//! Per-request deadline for identity service calls

use super::errors::{ServiceError, ServiceResult};
use super::types::{DelegationBatch, DeviceSecrets, PushAck};
use super::IdentityService;
use crate::core_identity::{DeviceId, UserId, UserSnapshot};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Wraps an [`IdentityService`] so no single call outlives `request_timeout`
pub struct TimeoutIdentityService {
    inner: Arc<dyn IdentityService>,
    request_timeout: Duration,
}

impl TimeoutIdentityService {
    pub fn new(inner: Arc<dyn IdentityService>, request_timeout: Duration) -> Self {
        Self {
            inner,
            request_timeout,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    async fn call<T, F>(&self, method: &'static str, fut: F) -> ServiceResult<T>
    where
        F: Future<Output = ServiceResult<T>>,
    {
        match tokio::time::timeout(self.request_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(method, timeout = ?self.request_timeout, "Identity service request timed out");
                Err(ServiceError::TimedOut {
                    method,
                    timeout: self.request_timeout,
                })
            }
        }
    }
}

#[async_trait]
impl IdentityService for TimeoutIdentityService {
    async fn post_delegations(&self, batch: &DelegationBatch) -> ServiceResult<PushAck> {
        self.call("post_delegations", self.inner.post_delegations(batch))
            .await
    }

    async fn load_user(&self, uid: &UserId) -> ServiceResult<UserSnapshot> {
        self.call("load_user", self.inner.load_user(uid)).await
    }

    async fn fetch_device_secrets(
        &self,
        uid: &UserId,
        device_id: &DeviceId,
    ) -> ServiceResult<DeviceSecrets> {
        self.call(
            "fetch_device_secrets",
            self.inner.fetch_device_secrets(uid, device_id),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_service::LoopbackIdentityService;

    /// Never answers
    struct StalledService;

    #[async_trait]
    impl IdentityService for StalledService {
        async fn post_delegations(&self, _batch: &DelegationBatch) -> ServiceResult<PushAck> {
            std::future::pending().await
        }

        async fn load_user(&self, _uid: &UserId) -> ServiceResult<UserSnapshot> {
            std::future::pending().await
        }

        async fn fetch_device_secrets(
            &self,
            _uid: &UserId,
            _device_id: &DeviceId,
        ) -> ServiceResult<DeviceSecrets> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_stalled_call_times_out() {
        let service = TimeoutIdentityService::new(Arc::new(StalledService), Duration::from_millis(20));
        let uid = UserSnapshot::new("alice", vec![0u8; 16]).uid();

        let err = service.load_user(&uid).await.unwrap_err();

        assert!(matches!(
            err,
            ServiceError::TimedOut { method: "load_user", timeout } if timeout == Duration::from_millis(20)
        ));
    }

    #[tokio::test]
    async fn test_fast_call_passes_through() {
        let loopback = Arc::new(LoopbackIdentityService::new());
        let me = loopback.register_user("alice", vec![0u8; 16]).await.unwrap();
        let service = TimeoutIdentityService::new(loopback, Duration::from_secs(5));

        let loaded = service.load_user(&me.uid()).await.unwrap();
        assert_eq!(loaded.uid(), me.uid());

        let missing = UserSnapshot::new("bob", vec![0u8; 16]).uid();
        assert!(matches!(
            service.load_user(&missing).await,
            Err(ServiceError::UserNotFound(_))
        ));
    }
}
