//! User snapshot loading backed by the identity service

use super::registry::ActiveDeviceRegistry;
use crate::core_identity::{UserId, UserSnapshot};
use crate::core_service::{IdentityService, ServiceResult};
use async_trait::async_trait;
use std::sync::Arc;

/// Loads the authoritative snapshot of a user
#[async_trait]
pub trait UserLoader: Send + Sync {
    async fn load(&self, uid: &UserId) -> ServiceResult<UserSnapshot>;
}

/// [`UserLoader`] over an [`IdentityService`]. The service does not know which
/// device this install runs as, so the installed device is taken from the
/// active device registry.
pub struct ServiceUserLoader {
    service: Arc<dyn IdentityService>,
    registry: Arc<ActiveDeviceRegistry>,
}

impl ServiceUserLoader {
    pub fn new(service: Arc<dyn IdentityService>, registry: Arc<ActiveDeviceRegistry>) -> Self {
        Self { service, registry }
    }
}

#[async_trait]
impl UserLoader for ServiceUserLoader {
    async fn load(&self, uid: &UserId) -> ServiceResult<UserSnapshot> {
        let snapshot = self.service.load_user(uid).await?;
        let installed = self
            .registry
            .current()
            .filter(|active| active.uid() == *uid)
            .map(|active| active.device_id());
        Ok(snapshot.with_installed_device(installed))
    }
}
